//! Stage library: the computation behind every node kind.
//!
//! Stages only see their input connectors (absent inputs are `None`) and
//! their own outputs. They size each output before writing it and overwrite
//! the whole logical range every frame.

use crate::capture::{CaptureBlock, CAPTURE_CAPACITY};
use crate::connector::Connector;
use crate::fft::{pow2_floor, transform};
use crate::node::{MicParams, NodeKind, SineParams};
use std::f32::consts::PI;

/// Working buffers for the transform stages, reused across frames.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    re: Vec<f32>,
    im: Vec<f32>,
}

impl Scratch {
    /// Zeroed working pair of length `n`.
    fn zeroed(&mut self, n: usize) -> (&mut [f32], &mut [f32]) {
        if self.re.len() < n {
            self.re.resize(n, 0.0);
            self.im.resize(n, 0.0);
        }
        let re = &mut self.re[..n];
        let im = &mut self.im[..n];
        re.fill(0.0);
        im.fill(0.0);
        (re, im)
    }
}

/// Per-frame context shared by all stages.
pub struct StageContext<'a> {
    /// This frame's captured block.
    pub capture: &'a CaptureBlock,
    /// Transform working buffers.
    pub scratch: &'a mut Scratch,
}

/// Run the stage for `kind`. Palette and sink nodes have nothing to compute.
pub fn process(
    kind: &NodeKind,
    inputs: &[Option<&Connector>],
    outputs: &mut [Connector],
    ctx: &mut StageContext<'_>,
) {
    let input = |i: usize| inputs.get(i).copied().flatten();
    match (kind, outputs) {
        (NodeKind::Sine(p), [out]) => sine(p, out),
        (NodeKind::Microphone(p), [out]) => microphone(p, ctx.capture, out),
        (NodeKind::Tee, [a, b]) => tee(input(0), a, b),
        (NodeKind::Fft, [re, im]) => forward_fft(input(0), re, im, ctx.scratch),
        (NodeKind::InverseFft, [out]) => inverse_fft(input(0), input(1), out, ctx.scratch),
        _ => {}
    }
}

/// `out[i] = sin(2π · i · frequency_step / sample_count)`.
pub fn sine(params: &SineParams, out: &mut Connector) {
    let n = params.sample_count;
    let step = params.frequency_step;
    for (i, s) in out.prepare(n).iter_mut().enumerate() {
        *s = (2.0 * PI * i as f32 * step / n as f32).sin();
    }
}

/// `out[i] = gain · capture[i]`, never reading past the block.
pub fn microphone(params: &MicParams, capture: &CaptureBlock, out: &mut Connector) {
    let n = params.sample_count.min(CAPTURE_CAPACITY);
    let gain = params.gain;
    for (o, &c) in out.prepare(n).iter_mut().zip(capture.iter()) {
        *o = gain * c;
    }
}

/// Copy the input verbatim onto both outputs.
pub fn tee(input: Option<&Connector>, a: &mut Connector, b: &mut Connector) {
    let src = input.map(Connector::as_slice).unwrap_or(&[]);
    a.prepare(src.len()).copy_from_slice(src);
    b.prepare(src.len()).copy_from_slice(src);
}

/// Transform the largest power-of-two prefix of the input and keep the
/// positive-frequency half of each part.
pub fn forward_fft(
    input: Option<&Connector>,
    re_out: &mut Connector,
    im_out: &mut Connector,
    scratch: &mut Scratch,
) {
    let src = input.map(Connector::as_slice).unwrap_or(&[]);
    let n = pow2_floor(src.len());
    if n < 2 {
        re_out.clear();
        im_out.clear();
        return;
    }

    let (re, im) = scratch.zeroed(n);
    re.copy_from_slice(&src[..n]);
    transform(re, im);
    re_out.prepare(n / 2).copy_from_slice(&re[..n / 2]);
    im_out.prepare(n / 2).copy_from_slice(&im[..n / 2]);
}

/// Rebuild a signal from a half spectrum by zero-padding both parts to full
/// length, transforming, and scaling the real result by `2/n`.
///
/// The spectrum is not mirrored or conjugated, so this only approximates the
/// inverse of [`forward_fft`]. With either input missing the output keeps its
/// previous contents.
pub fn inverse_fft(
    re_in: Option<&Connector>,
    im_in: Option<&Connector>,
    out: &mut Connector,
    scratch: &mut Scratch,
) {
    let (re_in, im_in) = match (re_in, im_in) {
        (Some(re), Some(im)) => (re.as_slice(), im.as_slice()),
        _ => return,
    };
    let half = pow2_floor(re_in.len().min(im_in.len()));
    if half == 0 {
        out.clear();
        return;
    }

    let n = 2 * half;
    let (re, im) = scratch.zeroed(n);
    re[..half].copy_from_slice(&re_in[..half]);
    im[..half].copy_from_slice(&im_in[..half]);
    transform(re, im);
    let scale = 2.0 / n as f32;
    for (o, &r) in out.prepare(n).iter_mut().zip(re.iter()) {
        *o = r * scale;
    }
}
