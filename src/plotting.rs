use textplots::{Chart, Plot, Shape};

use crate::waveform::WaveformSamples;

/// Determine the best scale and unit prefix for a given maximum magnitude
fn determine_scale(max_value: f64) -> (f64, &'static str) {
    if max_value >= 1.0 {
        (1.0, "")
    } else if max_value >= 1e-3 {
        (1e3, "m")
    } else if max_value >= 1e-6 {
        (1e6, "μ")
    } else if max_value >= 1e-9 {
        (1e9, "n")
    } else {
        (1e12, "p")
    }
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |a, &b| a.max(b.abs()))
}

/// Plot a waveform as voltage over time in the terminal
///
/// Both axes get an SI prefix chosen from the largest magnitude present.
///
/// # Arguments
/// * `samples` - Decoded waveform
/// * `title` - Optional title for the plot
/// * `width` - Optional plot width (default: 140)
/// * `height` - Optional plot height (default: 60)
pub fn plot_waveform(
    samples: &WaveformSamples,
    title: Option<&str>,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(&t_first), Some(&t_last)) = (samples.time().first(), samples.time().last()) else {
        return Err("Cannot plot empty waveform".into());
    };
    let (v_min, v_max) = samples.voltage_range().unwrap_or((0.0, 0.0));

    let width = width.unwrap_or(140);
    let height = height.unwrap_or(60);

    let (time_scale, time_unit) = determine_scale(max_abs(samples.time()));
    let (volt_scale, volt_unit) = determine_scale(max_abs(samples.voltage()));

    let frame: Vec<(f32, f32)> = samples
        .points()
        .map(|(t, v)| ((t * time_scale) as f32, (v * volt_scale) as f32))
        .collect();

    let x_min = (t_first * time_scale) as f32;
    let mut x_max = (t_last * time_scale) as f32;
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }

    println!("{}", title.unwrap_or("Oscilloscope Waveform"));
    println!("X-axis: Time ({time_unit}s) | Y-axis: Voltage ({volt_unit}V)");
    println!(
        "Range: {} samples | {:.3} to {:.3} {}V",
        samples.len(),
        v_min * volt_scale,
        v_max * volt_scale,
        volt_unit
    );
    println!("{}", "─".repeat(width));

    Chart::new(width as u32, height as u32, x_min, x_max)
        .lineplot(&Shape::Lines(&frame))
        .nice();

    println!("Time ({time_unit}s) →");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{decode, Preamble};

    fn samples(raw: &[u8]) -> WaveformSamples {
        let preamble = Preamble::parse("0,0,4,1,1e-6,-2e-6,0,0.04,0,130").unwrap();
        decode(raw, &preamble, 0.01, 1.0).unwrap()
    }

    #[test]
    fn test_determine_scale() {
        assert_eq!(determine_scale(5.0), (1.0, ""));
        assert_eq!(determine_scale(0.005), (1e3, "m"));
        assert_eq!(determine_scale(5e-6), (1e6, "μ"));
        assert_eq!(determine_scale(5e-9), (1e9, "n"));
        assert_eq!(determine_scale(5e-12), (1e12, "p"));
    }

    #[test]
    fn test_plot_waveform_basic() {
        assert!(plot_waveform(&samples(&[130, 155, 105, 130]), Some("CHAN1"), Some(80), Some(30)).is_ok());
    }

    #[test]
    fn test_plot_single_point() {
        assert!(plot_waveform(&samples(&[140]), None, None, None).is_ok());
    }

    #[test]
    fn test_plot_empty_waveform() {
        assert!(plot_waveform(&WaveformSamples::default(), None, None, None).is_err());
    }
}
