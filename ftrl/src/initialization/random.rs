use std::{
    cell::RefCell,
    error::Error,
    fmt::{self, Display},
    rc::Rc,
};

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError, Uniform, uniform::Error as UniformError};

use super::ParamGen;

/// Error returned when the parameters of a distribution are out of its domain.
#[derive(Debug)]
pub enum InitErr {
    Uniform(UniformError),
    Normal(NormalError),
}

impl Display for InitErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitErr::Uniform(e) => write!(f, "invalid uniform distribution: {e}"),
            InitErr::Normal(e) => write!(f, "invalid normal distribution: {e}"),
        }
    }
}

impl Error for InitErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InitErr::Uniform(e) => Some(e),
            InitErr::Normal(e) => Some(e),
        }
    }
}

/// Draws at most `budget` values out of a distribution, sharing its rng with other generators.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    budget: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, budget: usize) -> Self {
        Self {
            rng,
            distribution,
            budget,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Samples uniformly over `[low, high)`.
    ///
    /// # Returns
    /// An `InitErr` unless `low < high`, both finite.
    pub fn uniform(
        rng: Rc<RefCell<R>>,
        budget: usize,
        low: f32,
        high: f32,
    ) -> Result<Self, InitErr> {
        let distribution = Uniform::new(low, high).map_err(InitErr::Uniform)?;
        Ok(Self::new(rng, distribution, budget))
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Samples out of `N(mean, std_dev^2)`.
    ///
    /// # Returns
    /// An `InitErr` if `std_dev` isn't finite.
    pub fn normal(
        rng: Rc<RefCell<R>>,
        budget: usize,
        mean: f32,
        std_dev: f32,
    ) -> Result<Self, InitErr> {
        let distribution = Normal::new(mean, std_dev).map_err(InitErr::Normal)?;
        Ok(Self::new(rng, distribution, budget))
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.budget == 0 {
            return None;
        }

        let n = n.min(self.budget);
        self.budget -= n;

        let mut rng = self.rng.borrow_mut();
        Some((&self.distribution).sample_iter(&mut *rng).take(n).collect())
    }
}
