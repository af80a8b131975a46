//! Built-in plugin providers
//!
//! Small native effects implementing the host contract, so the bridge
//! recall works without any external plugin binaries installed.

use super::{
    PluginDescriptor, PluginError, PluginHost, PluginInstance, PluginResult, PortDescriptor,
};

// ── gain ────────────────────────────────────────────────────────────────

pub struct GainHost {
    descriptor: PluginDescriptor,
}

impl GainHost {
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor {
                name: "gain".to_string(),
                maker: "strand builtin".to_string(),
                controls: vec![PortDescriptor::new("gain", 1.0, 0.0, 4.0)],
            },
        }
    }
}

impl Default for GainHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginHost for GainHost {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn instantiate(&self, _samplerate: u32) -> PluginResult<Box<dyn PluginInstance>> {
        Ok(Box::new(GainPlugin { gain: 1.0 }))
    }
}

struct GainPlugin {
    gain: f32,
}

impl PluginInstance for GainPlugin {
    fn connect_control(&mut self, index: usize, value: f32) -> PluginResult<()> {
        if index != 0 {
            return Err(PluginError::ControlOutOfRange { index, count: 1 });
        }
        self.gain = value.clamp(0.0, 4.0);
        Ok(())
    }

    fn run(&mut self, input: &[f32], output: &mut [f32]) -> PluginResult<()> {
        for (out, sample) in output.iter_mut().zip(input.iter()) {
            *out = sample * self.gain;
        }
        Ok(())
    }
}

// ── one-pole lowpass ────────────────────────────────────────────────────

pub struct LowpassHost {
    descriptor: PluginDescriptor,
}

impl LowpassHost {
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor {
                name: "lowpass".to_string(),
                maker: "strand builtin".to_string(),
                controls: vec![PortDescriptor::new("cutoff", 2000.0, 10.0, 20000.0)],
            },
        }
    }
}

impl Default for LowpassHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginHost for LowpassHost {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn instantiate(&self, samplerate: u32) -> PluginResult<Box<dyn PluginInstance>> {
        if samplerate == 0 {
            return Err(PluginError::Instantiate("zero sample rate".to_string()));
        }
        let mut plugin = LowpassPlugin {
            samplerate: samplerate as f32,
            coefficient: 0.0,
            state: 0.0,
        };
        plugin.set_cutoff(2000.0);
        Ok(Box::new(plugin))
    }
}

struct LowpassPlugin {
    samplerate: f32,
    coefficient: f32,
    state: f32,
}

impl LowpassPlugin {
    fn set_cutoff(&mut self, cutoff: f32) {
        let cutoff = cutoff.clamp(10.0, self.samplerate / 2.0);
        self.coefficient =
            1.0 - (-2.0 * std::f32::consts::PI * cutoff / self.samplerate).exp();
    }
}

impl PluginInstance for LowpassPlugin {
    fn connect_control(&mut self, index: usize, value: f32) -> PluginResult<()> {
        if index != 0 {
            return Err(PluginError::ControlOutOfRange { index, count: 1 });
        }
        self.set_cutoff(value);
        Ok(())
    }

    fn run(&mut self, input: &[f32], output: &mut [f32]) -> PluginResult<()> {
        for (out, sample) in output.iter_mut().zip(input.iter()) {
            self.state += self.coefficient * (sample - self.state);
            *out = self.state;
        }
        Ok(())
    }

    fn deactivate(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_scales() {
        let host = GainHost::new();
        let mut plugin = host.instantiate(48000).unwrap();
        plugin.connect_control(0, 0.5).unwrap();

        let input = [1.0f32, -0.5, 0.25];
        let mut output = [0.0f32; 3];
        plugin.run(&input, &mut output).unwrap();
        assert_eq!(output, [0.5, -0.25, 0.125]);
    }

    #[test]
    fn test_gain_rejects_bad_control() {
        let host = GainHost::new();
        let mut plugin = host.instantiate(48000).unwrap();
        assert!(matches!(
            plugin.connect_control(3, 1.0),
            Err(PluginError::ControlOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_lowpass_attenuates_steps() {
        let host = LowpassHost::new();
        let mut plugin = host.instantiate(48000).unwrap();
        plugin.connect_control(0, 100.0).unwrap();

        let input = [1.0f32; 8];
        let mut output = [0.0f32; 8];
        plugin.run(&input, &mut output).unwrap();
        // converging toward the step value, never overshooting
        assert!(output[0] < 0.1);
        assert!(output.windows(2).all(|w| w[1] >= w[0]));
        assert!(output[7] < 1.0);
    }
}
