//! In-place radix-2 decimation-in-time transform and spectrum views.

use std::f32::consts::PI;

/// Largest power of two not above `n`; zero for zero.
pub fn pow2_floor(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}

/// Forward transform of `(re, im)` in place.
///
/// Both slices must share a power-of-two length; anything shorter than two
/// samples is left untouched.
pub fn transform(re: &mut [f32], im: &mut [f32]) {
    let n = re.len();
    debug_assert_eq!(n, im.len());
    debug_assert!(n == 0 || n.is_power_of_two());
    if n < 2 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = n / 2;
    for i in 1..n - 1 {
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
        let mut k = n / 2;
        while k <= j {
            j -= k;
            k /= 2;
        }
        j += k;
    }

    let stages = n.trailing_zeros();
    for stage in 1..=stages {
        let le = 1usize << (stage - 1);
        let sr = (PI / le as f32).cos();
        let si = -(PI / le as f32).sin();
        let mut ur = 1.0f32;
        let mut ui = 0.0f32;

        for sub in 0..le {
            let mut k = sub;
            while k < n {
                let ip = k + le;
                let tr = re[ip] * ur - im[ip] * ui;
                let ti = re[ip] * ui + im[ip] * ur;
                re[ip] = re[k] - tr;
                im[ip] = im[k] - ti;
                re[k] += tr;
                im[k] += ti;
                k += 2 * le;
            }
            let t = ur;
            ur = t * sr - ui * si;
            ui = t * si + ui * sr;
        }
    }
}

/// Per-bin magnitude `sqrt(re² + im²)`.
pub fn magnitude(re: &[f32], im: &[f32]) -> Vec<f32> {
    re.iter().zip(im).map(|(&r, &i)| r.hypot(i)).collect()
}

/// Per-bin phase `atan(im / re)`, pinned to `±π/2` where `re` is zero.
pub fn phase(re: &[f32], im: &[f32]) -> Vec<f32> {
    re.iter()
        .zip(im)
        .map(|(&r, &i)| {
            if r != 0.0 {
                (i / r).atan()
            } else if i > 0.0 {
                PI / 2.0
            } else {
                -PI / 2.0
            }
        })
        .collect()
}
