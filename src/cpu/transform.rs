// data-parallel "transform" over n independent work-items
use rayon::prelude::*;

/// CPU execution of one stage. Every call returns only after all
/// work-items finished, so a call boundary is a full barrier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CpuTransform {
    /// plain loop, the reference for determinism tests
    #[default]
    Serial,
    /// rayon work-stealing loop
    Parallel,
}

impl CpuTransform {
    /// `out[i] = f(i)` for every i.
    pub fn map<T, F>(self, out: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            CpuTransform::Serial => out.iter_mut().enumerate().for_each(|(i, o)| *o = f(i)),
            CpuTransform::Parallel => out.par_iter_mut().enumerate().for_each(|(i, o)| *o = f(i)),
        }
    }

    /// `(a[i], b[i]) = f(i)` for every i.
    pub fn map2<A, B, F>(self, a: &mut [A], b: &mut [B], f: F)
    where
        A: Send,
        B: Send,
        F: Fn(usize) -> (A, B) + Sync + Send,
    {
        debug_assert_eq!(a.len(), b.len());
        let write = |(i, (oa, ob)): (usize, (&mut A, &mut B))| {
            let (va, vb) = f(i);
            *oa = va;
            *ob = vb;
        };
        match self {
            CpuTransform::Serial => a.iter_mut().zip(b.iter_mut()).enumerate().for_each(write),
            CpuTransform::Parallel => {
                a.par_iter_mut().zip(b.par_iter_mut()).enumerate().for_each(write)
            }
        }
    }

    /// In-place update of two parallel arrays.
    pub fn update2<A, B, F>(self, a: &mut [A], b: &mut [B], f: F)
    where
        A: Send,
        B: Send,
        F: Fn(&mut A, &mut B) + Sync + Send,
    {
        debug_assert_eq!(a.len(), b.len());
        match self {
            CpuTransform::Serial => a.iter_mut().zip(b.iter_mut()).for_each(|(x, y)| f(x, y)),
            CpuTransform::Parallel => {
                a.par_iter_mut().zip(b.par_iter_mut()).for_each(|(x, y)| f(x, y))
            }
        }
    }
}
