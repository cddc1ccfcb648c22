//! Call cost model
//!
//! The engine attaches a per-minute breakdown to the call record; billing
//! reconciliation happens elsewhere.

use crate::call::CostBreakdown;

const STT_CENTS_PER_MINUTE: f64 = 0.6;
const LLM_CENTS_PER_MINUTE: f64 = 1.5;
const TTS_CENTS_PER_MINUTE: f64 = 1.5;

/// Compute the cost breakdown for a call of the given duration.
pub fn cost_for_duration(duration_secs: u64) -> CostBreakdown {
    let minutes = duration_secs as f64 / 60.0;
    let stt = (minutes * STT_CENTS_PER_MINUTE).round() as u32;
    let llm = (minutes * LLM_CENTS_PER_MINUTE).round() as u32;
    let tts = (minutes * TTS_CENTS_PER_MINUTE).round() as u32;
    CostBreakdown {
        stt_cents: stt,
        llm_cents: llm,
        tts_cents: tts,
        total_cents: stt + llm + tts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_minute_call() {
        let cost = cost_for_duration(60);
        assert_eq!(cost.stt_cents, 1);
        assert_eq!(cost.llm_cents, 2);
        assert_eq!(cost.tts_cents, 2);
        assert_eq!(cost.total_cents, 5);
    }

    #[test]
    fn zero_duration_is_free() {
        assert_eq!(cost_for_duration(0).total_cents, 0);
    }

    #[test]
    fn total_is_component_sum() {
        for secs in [7, 61, 600, 3600] {
            let c = cost_for_duration(secs);
            assert_eq!(c.total_cents, c.stt_cents + c.llm_cents + c.tts_cents);
        }
    }
}
