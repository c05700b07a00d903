use ndarray::{Array1, Array2};

/// Freshness of a cached quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Has to be recomputed before use
    #[default]
    Stale,
    /// Corresponds to the current parameters
    Fresh,
}

/// Cached value with its own freshness flag
#[derive(Clone, Debug, Default)]
pub struct Cached<T> {
    value: T,
    state: CacheState,
}

impl<T> Cached<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            state: CacheState::Stale,
        }
    }

    #[inline]
    pub fn state(&self) -> CacheState {
        self.state
    }

    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.state == CacheState::Fresh
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn store(&mut self, value: T) {
        self.value = value;
        self.state = CacheState::Fresh;
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.state = CacheState::Stale;
    }
}

/// Snapshot taken by [CostFunction::push](crate::CostFunction::push)
#[derive(Clone, Debug)]
pub(super) struct Checkpoint {
    pub value: f64,
    pub parameters: Vec<f64>,
    pub gradient: Array1<f64>,
    pub hessian: Array2<f64>,
    pub calculated: Array1<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_invalidate() {
        let mut cached = Cached::new(0.0);
        assert_eq!(cached.state(), CacheState::Stale);
        cached.store(1.5);
        assert!(cached.is_fresh());
        assert_eq!(*cached.get(), 1.5);
        cached.invalidate();
        assert!(!cached.is_fresh());
        // the stale value is still accessible
        assert_eq!(*cached.get(), 1.5);
    }
}
