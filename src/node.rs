//! Node kinds and their parameters.

#![forbid(unsafe_code)]

use crate::capture::CAPTURE_CAPACITY;

/// Upper bound for a sine generator's sample count.
pub const SINE_MAX_SAMPLES: usize = 4096;
/// Default sine sample count.
pub const SINE_DEFAULT_SAMPLES: usize = 512;
/// Allowed sine frequency step range.
pub const SINE_FREQUENCY_RANGE: (f32, f32) = (0.0, 10.0);
/// Default microphone sample count.
pub const MIC_DEFAULT_SAMPLES: usize = 1024;
/// Allowed microphone gain range.
pub const MIC_GAIN_RANGE: (f32, f32) = (0.0, 5.0);
/// Allowed range for the sink's upper display bound.
pub const SINK_MAX_RANGE: (f32, f32) = (1.0, 40.0);
/// Most input ports any kind has.
pub const MAX_INPUT_PORTS: usize = 2;

const PORTS_NONE: &[&str] = &[];
const PORTS_MONO: &[&str] = &["in"];
const PORTS_OUT: &[&str] = &["out"];
const PORTS_TEE_OUT: &[&str] = &["a", "b"];
const PORTS_SPECTRUM: &[&str] = &["re", "im"];

/// Sine generator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineParams {
    /// Cycles across the whole buffer.
    pub frequency_step: f32,
    /// Output length.
    pub sample_count: usize,
}

impl Default for SineParams {
    fn default() -> Self {
        Self {
            frequency_step: 1.0,
            sample_count: SINE_DEFAULT_SAMPLES,
        }
    }
}

/// Microphone generator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MicParams {
    /// Linear gain applied to the captured block.
    pub gain: f32,
    /// Output length; never above [`CAPTURE_CAPACITY`].
    pub sample_count: usize,
}

impl Default for MicParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            sample_count: MIC_DEFAULT_SAMPLES,
        }
    }
}

/// Display range of a sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkParams {
    /// Lower display bound.
    pub min: f32,
    /// Upper display bound.
    pub max: f32,
}

impl Default for SinkParams {
    fn default() -> Self {
        Self { min: -1.0, max: 1.0 }
    }
}

impl SinkParams {
    /// Clamp a sample into the display range.
    pub fn clamp(&self, value: f32) -> f32 {
        if value >= self.max {
            self.max
        } else if value <= self.min {
            self.min
        } else {
            value
        }
    }
}

/// The kind of a node, carrying only that kind's parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Bootstrap creation palette; no ports, never evaluated.
    Palette,
    /// Sine wave generator.
    Sine(SineParams),
    /// Scaled copy of the captured microphone block.
    Microphone(MicParams),
    /// Duplicates its input onto two outputs.
    Tee,
    /// Forward radix-2 transform: outputs real and imaginary halves.
    Fft,
    /// Zero-padded reconstruction from a half spectrum.
    InverseFft,
    /// Display endpoint.
    Sink(SinkParams),
}

impl NodeKind {
    /// Sine generator with default parameters.
    pub fn sine() -> Self {
        NodeKind::Sine(SineParams::default())
    }

    /// Microphone generator with default parameters.
    pub fn microphone() -> Self {
        NodeKind::Microphone(MicParams::default())
    }

    /// Sink with the default `[-1, 1]` range.
    pub fn sink() -> Self {
        NodeKind::Sink(SinkParams::default())
    }

    /// Input port names.
    pub fn input_ports(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Palette => PORTS_NONE,
            NodeKind::Sine(_) => PORTS_NONE,
            NodeKind::Microphone(_) => PORTS_NONE,
            NodeKind::Tee => PORTS_MONO,
            NodeKind::Fft => PORTS_MONO,
            NodeKind::InverseFft => PORTS_SPECTRUM,
            NodeKind::Sink(_) => PORTS_MONO,
        }
    }

    /// Output port names.
    pub fn output_ports(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Palette => PORTS_NONE,
            NodeKind::Sine(_) => PORTS_OUT,
            NodeKind::Microphone(_) => PORTS_OUT,
            NodeKind::Tee => PORTS_TEE_OUT,
            NodeKind::Fft => PORTS_SPECTRUM,
            NodeKind::InverseFft => PORTS_OUT,
            NodeKind::Sink(_) => PORTS_NONE,
        }
    }

    /// Number of input ports.
    pub fn input_port_count(&self) -> usize {
        self.input_ports().len()
    }

    /// Number of output ports.
    pub fn output_port_count(&self) -> usize {
        self.output_ports().len()
    }

    /// True for display endpoints.
    pub fn is_sink(&self) -> bool {
        matches!(self, NodeKind::Sink(_))
    }

    /// Title shown on the node's panel.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Palette => "menu",
            NodeKind::Sine(_) => "Sine wave generator",
            NodeKind::Microphone(_) => "Microphone signal",
            NodeKind::Tee => "Tee",
            NodeKind::Fft => "FFT",
            NodeKind::InverseFft => "Reverse FFT",
            NodeKind::Sink(_) => "Plot",
        }
    }

    /// Bring creation-time parameters into their legal ranges.
    pub(crate) fn normalized(self) -> Self {
        match self {
            NodeKind::Sine(p) => NodeKind::Sine(SineParams {
                frequency_step: clamp_finite(p.frequency_step, SINE_FREQUENCY_RANGE, 1.0),
                sample_count: p.sample_count.min(SINE_MAX_SAMPLES),
            }),
            NodeKind::Microphone(p) => NodeKind::Microphone(MicParams {
                gain: clamp_finite(p.gain, MIC_GAIN_RANGE, 1.0),
                sample_count: p.sample_count.min(CAPTURE_CAPACITY),
            }),
            NodeKind::Sink(p) if !(p.min.is_finite() && p.max.is_finite() && p.min < p.max) => {
                NodeKind::sink()
            }
            other => other,
        }
    }
}

fn clamp_finite(value: f32, (lo, hi): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

/// A single parameter update for `Graph::set_param`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    /// Sine frequency step.
    FrequencyStep(f32),
    /// Sine or microphone output length.
    SampleCount(usize),
    /// Microphone gain.
    Gain(f32),
    /// Sink upper bound; the lower bound follows as `-max`.
    DisplayMax(f32),
    /// Sink lower bound alone.
    DisplayMin(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_arity_by_kind() {
        let arity = |k: NodeKind| (k.input_port_count(), k.output_port_count());
        assert_eq!(arity(NodeKind::Palette), (0, 0));
        assert_eq!(arity(NodeKind::sine()), (0, 1));
        assert_eq!(arity(NodeKind::microphone()), (0, 1));
        assert_eq!(arity(NodeKind::Tee), (1, 2));
        assert_eq!(arity(NodeKind::Fft), (1, 2));
        assert_eq!(arity(NodeKind::InverseFft), (2, 1));
        assert_eq!(arity(NodeKind::sink()), (1, 0));
    }

    #[test]
    fn no_kind_exceeds_max_input_ports() {
        let kinds = [
            NodeKind::Palette,
            NodeKind::sine(),
            NodeKind::microphone(),
            NodeKind::Tee,
            NodeKind::Fft,
            NodeKind::InverseFft,
            NodeKind::sink(),
        ];
        for kind in kinds {
            assert!(kind.input_port_count() <= MAX_INPUT_PORTS);
        }
    }

    #[test]
    fn normalized_clamps_mic_to_capture() {
        let kind = NodeKind::Microphone(MicParams {
            gain: 1.0,
            sample_count: CAPTURE_CAPACITY * 2,
        })
        .normalized();
        assert_eq!(
            kind,
            NodeKind::Microphone(MicParams {
                gain: 1.0,
                sample_count: CAPTURE_CAPACITY
            })
        );
    }

    #[test]
    fn sink_clamp() {
        let p = SinkParams { min: -2.0, max: 2.0 };
        assert_eq!(p.clamp(3.0), 2.0);
        assert_eq!(p.clamp(-3.0), -2.0);
        assert_eq!(p.clamp(0.5), 0.5);
    }
}
