use num_format::{CustomFormat, Grouping};

/// `1_234_567` style grouping for counters in log output
pub fn number_format() -> CustomFormat {
    CustomFormat::builder()
        .grouping(Grouping::Standard)
        .minus_sign("-")
        .separator("_")
        .build()
        .expect("static number format should be valid")
}
