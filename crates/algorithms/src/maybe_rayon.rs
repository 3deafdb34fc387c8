//! Row-parallel iteration with or without rayon.
//!
//! With the `parallel` feature the rayon iterator traits are re-exported.
//! Without it, `into_par_iter()` is a plain `into_iter()`, so the convolution
//! and resampling row loops compile unchanged against `Iterator`.

#[cfg(feature = "parallel")]
pub(crate) use rayon::iter::{IntoParallelIterator, ParallelIterator};

#[cfg(not(feature = "parallel"))]
pub(crate) trait IntoParallelIterator: IntoIterator + Sized {
    fn into_par_iter(self) -> Self::IntoIter {
        self.into_iter()
    }
}

#[cfg(not(feature = "parallel"))]
impl<I: IntoIterator> IntoParallelIterator for I {}
