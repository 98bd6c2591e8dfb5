/// Distribution of the number of successes among independent Bernoulli trials.
///
/// `run(pu)` returns `fe` with `fe[k]` the probability that exactly `k` of the
/// trials succeed, trial `i` succeeding with probability `pu[i]`. The two
/// buffers swap roles after every trial, so no recursion and no allocation
/// happens once the buffers have grown to the largest `pu.len() + 1` seen.
#[derive(Debug, Clone, Default)]
pub struct Convolver {
    current: Vec<f64>,
    next: Vec<f64>,
}

impl Convolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_trials: usize) -> Self {
        Self {
            current: Vec::with_capacity(max_trials + 1),
            next: Vec::with_capacity(max_trials + 1),
        }
    }

    pub fn run(&mut self, pu: &[f64]) -> &[f64] {
        let c = pu.len();
        self.current.clear();
        self.current.resize(c + 1, 0.0);
        self.next.clear();
        self.next.resize(c + 1, 0.0);
        self.current[0] = 1.0;

        for (k, &p) in pu.iter().enumerate() {
            let q = 1.0 - p;
            self.next[0] = q * self.current[0];
            for i in 0..k {
                self.next[i + 1] = q * self.current[i + 1] + p * self.current[i];
            }
            self.next[k + 1] = p * self.current[k];
            std::mem::swap(&mut self.current, &mut self.next);
        }
        &self.current
    }
}

pub fn convolve(pu: &[f64]) -> Vec<f64> {
    Convolver::with_capacity(pu.len()).run(pu).to_vec()
}
