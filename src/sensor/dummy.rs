// Dummy sensor driver
// Returns fixed readings so clients can be tested without hardware.

use super::{Sample, SensorDriver};
use crate::constants::SAMPLE_NO_VALUE;
use crate::enums::SensorCap;
use crate::error::Result;

pub struct DummyDriver;

impl SensorDriver for DummyDriver {
    fn get_sample(&mut self, cap: SensorCap) -> Result<Sample> {
        let sample = match cap {
            SensorCap::Ambient => Sample {
                x: SAMPLE_NO_VALUE,
                y: SAMPLE_NO_VALUE,
                z: SAMPLE_NO_VALUE,
                luminance: 7.7,
            },
            _ => Sample {
                x: 0.1,
                y: 0.2,
                z: 0.3,
                luminance: SAMPLE_NO_VALUE,
            },
        };
        log::debug!("Dummy sample for {}: {:?}", cap, sample);
        Ok(sample)
    }
}
