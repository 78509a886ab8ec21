use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// World constants. Coordinates are screen pixels, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameConfig {
    pub screen_width: i32,
    pub screen_height: i32,
    pub bird_x: i32,
    pub gravity: i32,
    /// upward velocity set by a flap
    pub flap_strength: i32,
    pub pipe_width: i32,
    /// vertical size of the passable gap
    pub pipe_gap: i32,
    /// horizontal scroll per tick
    pub pipe_speed: i32,
    /// horizontal distance between consecutive pipes
    pub pipe_spacing: i32,
    pub pipe_count: usize,
    /// range of the gap's upper edge (inclusive)
    pub pipe_height_min: i32,
    pub pipe_height_max: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen_width: 400,
            screen_height: 600,
            bird_x: 50,
            gravity: 1,
            flap_strength: 15,
            pipe_width: 70,
            pipe_gap: 200,
            pipe_speed: 3,
            pipe_spacing: 300,
            pipe_count: 3,
            pipe_height_min: 100,
            pipe_height_max: 400,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.screen_width <= 0 || self.screen_height <= 0 {
            bail!("screen must have a positive size, got {}x{}", self.screen_width, self.screen_height);
        }
        if !(0..self.screen_width).contains(&self.bird_x) {
            bail!("bird x {} lies outside the screen", self.bird_x);
        }
        if self.pipe_width <= 0 || self.pipe_gap <= 0 || self.pipe_speed <= 0 || self.pipe_spacing <= 0 {
            bail!("pipe width, gap, speed and spacing must be positive");
        }
        if self.pipe_count == 0 {
            bail!("at least one pipe is required");
        }
        if self.pipe_height_min > self.pipe_height_max {
            bail!(
                "pipe height range is empty: {}..={}",
                self.pipe_height_min,
                self.pipe_height_max
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bird {
    pub x: i32,
    pub y: i32,
    pub velocity: i32,
}

impl Bird {
    fn new(config: &GameConfig) -> Self {
        Self {
            x: config.bird_x,
            y: config.screen_height / 2,
            velocity: 0,
        }
    }

    fn flap(
        &mut self,
        config: &GameConfig,
    ) {
        self.velocity = -config.flap_strength;
    }

    fn update(
        &mut self,
        config: &GameConfig,
    ) {
        self.velocity += config.gravity;
        self.y += self.velocity;
    }
}

/// A pipe pair. The gap spans `height..=height + pipe_gap`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pipe {
    pub x: i32,
    pub height: i32,
    pub passed: bool,
}

impl Pipe {
    fn new(
        x: i32,
        height: i32,
    ) -> Self {
        Self {
            x,
            height,
            passed: false,
        }
    }

    pub fn gap_center(
        &self,
        config: &GameConfig,
    ) -> i32 {
        self.height + config.pipe_gap / 2
    }

    fn blocks(
        &self,
        bird: &Bird,
        config: &GameConfig,
    ) -> bool {
        let inside_x = self.x < bird.x && bird.x < self.x + config.pipe_width;
        inside_x && (bird.y < self.height || bird.y > self.height + config.pipe_gap)
    }
}

/// Physics and obstacle field of the flap game
pub struct FlappyMechanics {
    config: GameConfig,
    bird: Bird,
    /// ordered by x
    pipes: Vec<Pipe>,
    score: u32,
    rng: StdRng,
}

impl FlappyMechanics {
    pub fn new(
        config: GameConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut mechanics = Self {
            bird: Bird::new(&config),
            pipes: Vec::with_capacity(config.pipe_count),
            score: 0,
            config,
            rng,
        };
        mechanics.reset();
        Ok(mechanics)
    }

    pub fn config(&self) -> &GameConfig { &self.config }

    pub fn bird(&self) -> &Bird { &self.bird }

    pub fn pipes(&self) -> &[Pipe] { &self.pipes }

    pub fn score(&self) -> u32 { self.score }

    /// Bird back to the start position, fresh pipe field, score zero
    pub fn reset(&mut self) {
        self.bird = Bird::new(&self.config);
        self.pipes.clear();
        for i in 0..self.config.pipe_count {
            let x = self.config.screen_width + i as i32 * self.config.pipe_spacing;
            let pipe = self.spawn_pipe(x);
            self.pipes.push(pipe);
        }
        self.score = 0;
    }

    fn spawn_pipe(
        &mut self,
        x: i32,
    ) -> Pipe {
        let height = self.rng.gen_range(self.config.pipe_height_min..=self.config.pipe_height_max);
        Pipe::new(x, height)
    }

    /// Advances the world by one tick
    pub fn time_step(
        &mut self,
        flap: bool,
    ) {
        if flap {
            self.bird.flap(&self.config);
        }
        self.bird.update(&self.config);

        for pipe in self.pipes.iter_mut() {
            pipe.x -= self.config.pipe_speed;
            if !pipe.passed && pipe.x < self.bird.x {
                pipe.passed = true;
                self.score += 1;
            }
        }

        // collect-then-mutate: drop pipes which left the screen, then refill the field behind the last one
        let pipe_width = self.config.pipe_width;
        let before = self.pipes.len();
        self.pipes.retain(|p| p.x + pipe_width >= 0);
        for _ in self.pipes.len()..before {
            let x = match self.pipes.last() {
                Some(last) => i32::max(self.config.screen_width, last.x + self.config.pipe_spacing),
                None => self.config.screen_width,
            };
            let pipe = self.spawn_pipe(x);
            self.pipes.push(pipe);
        }
    }

    /// Bird left the screen vertically or hit a pipe
    pub fn collision(&self) -> bool {
        if self.bird.y > self.config.screen_height || self.bird.y < 0 {
            return true;
        }
        self.pipes.iter().any(|p| p.blocks(&self.bird, &self.config))
    }

    /// The first pipe the bird has not yet passed completely
    pub fn next_pipe(&self) -> Option<&Pipe> {
        self.pipes
            .iter()
            .find(|p| p.x + self.config.pipe_width >= self.bird.x)
    }

    #[cfg(test)]
    pub(crate) fn place(
        &mut self,
        bird: Bird,
        pipes: Vec<Pipe>,
    ) {
        self.bird = bird;
        self.pipes = pipes;
    }
}
