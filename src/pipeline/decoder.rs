//! Contract call-data decoding.
//!
//! A transaction's `data` field is base64 of a UTF-8 string of the form
//! `functionName@arg1@arg2@...`, where each argument is a hexadecimal
//! string (optionally `0x`-prefixed) encoding a big-endian unsigned
//! integer. Decoding is a pure function: anything malformed yields
//! "nothing" rather than an error, because an undecodable payload simply
//! means the transaction is not a relevant contract call.
//!
//! The four calls this pipeline tracks are lifted into the closed
//! [`ChallengeCall`] enum so dispatch in the Projector is exhaustive.

use super::error::CallDataError;
use alloy_primitives::U256;
use base64::{engine::general_purpose, Engine as _};

/// A structurally decoded contract call: function name plus raw hex
/// arguments. Empty argument segments are dropped; `0x` prefixes are left
/// for the consumer to strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    pub function: String,
    pub args: Vec<String>,
}

/// The contract calls the pipeline projects. Parsed once from a
/// [`DecodedCall`]; everything downstream matches on this enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeCall {
    Create {
        /// Unix seconds, saturated into `i64` on overflow.
        start: i64,
        end: i64,
        reward_budget: U256,
        reward_per_point: U256,
    },
    Join,
    SubmitWorkout {
        points: U256,
    },
    Close,
}

/// Decode a transaction's base64 call data.
///
/// Returns `None` on invalid base64, invalid UTF-8, or an empty function
/// name. Never fails fatally — the caller treats `None` as "not a
/// relevant call".
pub fn decode_call_data(data: Option<&str>) -> Option<DecodedCall> {
    let data = data?;
    let bytes = general_purpose::STANDARD.decode(data).ok()?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::debug!("Call data is not UTF-8: 0x{}", hex::encode(e.as_bytes()));
            return None;
        }
    };

    let mut segments = text.split('@');
    let function = segments.next()?.to_owned();
    if function.is_empty() {
        return None;
    }

    let args = segments
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();

    Some(DecodedCall { function, args })
}

/// Lift a decoded call into [`ChallengeCall`].
///
/// `Ok(None)` means the function is not one the pipeline tracks and the
/// transaction should be skipped silently. `Err` means the function is
/// tracked but its arguments are missing or unparseable; the caller logs
/// a warning and skips.
pub fn parse_tracked_call(call: &DecodedCall) -> Result<Option<ChallengeCall>, CallDataError> {
    match call.function.as_str() {
        "createChallenge" => {
            let start = required_i64_arg(call, "createChallenge", 0)?;
            let end = required_i64_arg(call, "createChallenge", 1)?;
            let reward_budget = optional_u256_arg(call, "createChallenge", 2)?;
            let reward_per_point = optional_u256_arg(call, "createChallenge", 3)?;
            Ok(Some(ChallengeCall::Create {
                start,
                end,
                reward_budget,
                reward_per_point,
            }))
        }
        "joinChallenge" => Ok(Some(ChallengeCall::Join)),
        "submitWorkout" => {
            let points = required_u256_arg(call, "submitWorkout", 0)?;
            Ok(Some(ChallengeCall::SubmitWorkout { points }))
        }
        "closeChallenge" => Ok(Some(ChallengeCall::Close)),
        _ => Ok(None),
    }
}

/// Parse a big-endian hex argument into a `U256`, stripping an optional
/// `0x` prefix.
fn parse_hex_u256(
    function: &'static str,
    index: usize,
    value: &str,
) -> Result<U256, CallDataError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    U256::from_str_radix(digits, 16).map_err(|_| CallDataError::InvalidHex {
        function,
        index,
        value: value.to_owned(),
    })
}

fn required_u256_arg(
    call: &DecodedCall,
    function: &'static str,
    index: usize,
) -> Result<U256, CallDataError> {
    let value = call
        .args
        .get(index)
        .ok_or(CallDataError::MissingArgument { function, index })?;
    parse_hex_u256(function, index, value)
}

/// Absent arguments default to zero; present-but-invalid hex is an error.
fn optional_u256_arg(
    call: &DecodedCall,
    function: &'static str,
    index: usize,
) -> Result<U256, CallDataError> {
    match call.args.get(index) {
        Some(value) => parse_hex_u256(function, index, value),
        None => Ok(U256::ZERO),
    }
}

/// Hex argument as seconds, saturated to `i64::MAX` when the encoded
/// value does not fit.
fn required_i64_arg(
    call: &DecodedCall,
    function: &'static str,
    index: usize,
) -> Result<i64, CallDataError> {
    let value = required_u256_arg(call, function, index)?;
    Ok(i64::try_from(value).unwrap_or(i64::MAX))
}
