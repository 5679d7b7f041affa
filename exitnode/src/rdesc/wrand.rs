use rand::Rng;
use serde::{Deserialize, Serialize};

/// One weighted choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrandItem<T> {
    pub weight: f64,
    pub item: T,
}

/// A weighted random picker over a fixed set of choices. `pick` selects one
/// value with probability proportional to its weight; callers guarantee the
/// set is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wrand<T>(pub Vec<WrandItem<T>>);

impl<T: Clone> Wrand<T> {
    pub fn new(items: Vec<WrandItem<T>>) -> Self {
        Wrand(items)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pick(&self) -> T {
        self.pick_with(&mut rand::rng())
    }

    /// Same as `pick` but draws from the given source, for deterministic
    /// tests.
    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        assert!(!self.0.is_empty(), "Wrand::pick called on an empty set");

        let sum: f64 = self.0.iter().map(|i| i.weight).sum();
        let mut r: f64 = rng.random::<f64>() * sum;

        for item in &self.0 {
            if r < item.weight {
                return item.item.clone();
            }
            r -= item.weight;
        }

        self.0.last().expect("non-empty").item.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn single_item_is_deterministic() {
        let w = Wrand::new(vec![WrandItem { weight: 1.0, item: "only" }]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(w.pick_with(&mut rng), "only");
        }
    }

    #[test]
    fn zero_weight_items_are_never_picked() {
        let w = Wrand::new(vec![
            WrandItem { weight: 0.0, item: "never" },
            WrandItem { weight: 1.0, item: "always" },
        ]);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            assert_eq!(w.pick_with(&mut rng), "always");
        }
    }

    #[test]
    fn picks_roughly_respect_weights() {
        let w = Wrand::new(vec![
            WrandItem { weight: 1.0, item: 0 },
            WrandItem { weight: 3.0, item: 1 },
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0u32; 2];
        for _ in 0..4000 {
            counts[w.pick_with(&mut rng)] += 1;
        }
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!((2.0..5.0).contains(&ratio), "ratio was {ratio}");
    }
}
