use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::{Discrete, DiscreteCDF, Poisson};

// A non-positive mean is treated as the distribution concentrated at zero.

pub fn poisson_pmf(k: usize, mean: f64) -> f64 {
    match Poisson::new(mean) {
        Ok(poisson) => poisson.pmf(k as u64),
        Err(_) => {
            if k == 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// `P(X > k)` for `X ~ Poisson(mean)`.
pub fn poisson_survival(k: usize, mean: f64) -> f64 {
    match Poisson::new(mean) {
        Ok(poisson) => poisson.sf(k as u64),
        Err(_) => 0.0,
    }
}

pub fn poisson_sample<R: Rng + ?Sized>(rng: &mut R, mean: f64) -> usize {
    match rand_distr::Poisson::new(mean) {
        Ok(poisson) => {
            let sample: f64 = poisson.sample(rng);
            sample as usize
        }
        Err(_) => 0,
    }
}

/// Smallest `g` such that `P(X > g) <= threshold` for `X ~ Poisson(mean)`.
pub fn max_cavity_size(mean: f64, threshold: f64) -> usize {
    // far beyond any tail a positive threshold can reach
    let limit = (mean.max(0.0) + 40.0 * mean.max(0.0).sqrt() + 40.0) as usize;
    let mut g = 0;
    while g < limit && poisson_survival(g, mean) > threshold {
        g += 1;
    }
    g
}
