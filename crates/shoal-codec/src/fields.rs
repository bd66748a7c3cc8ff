//! Positional encoding of whole objects against a shared descriptor.
//!
//! Once a descriptor has been announced, an object travels as the
//! descriptor reference plus one token per property in descriptor order.
//! Property names are not repeated.

use shoal_shape::TypeDescriptor;

use crate::error::{CodecError, CodecResult};
use crate::token::{decode, encode};
use crate::value::Value;

/// Encode `fields` as positional tokens in `descriptor` order.
///
/// `fields` must list exactly the descriptor's properties, in order.
pub fn encode_fields(
    descriptor: &TypeDescriptor,
    fields: &[(String, Value)],
) -> CodecResult<Vec<String>> {
    check_arity(descriptor, fields.len())?;
    fields
        .iter()
        .zip(descriptor.property_names())
        .enumerate()
        .map(|(position, ((name, value), expected))| {
            if name != expected {
                return Err(CodecError::ShapeMismatch {
                    signature: descriptor.signature().to_string(),
                    position,
                    found: name.clone(),
                });
            }
            Ok(encode(value))
        })
        .collect()
}

/// Decode positional tokens back into named fields.
pub fn decode_fields(
    descriptor: &TypeDescriptor,
    tokens: &[String],
) -> CodecResult<Vec<(String, Value)>> {
    check_arity(descriptor, tokens.len())?;
    descriptor
        .property_names()
        .iter()
        .zip(tokens)
        .map(|(name, token)| Ok((name.clone(), decode(token)?)))
        .collect()
}

fn check_arity(descriptor: &TypeDescriptor, actual: usize) -> CodecResult<()> {
    if descriptor.len() != actual {
        return Err(CodecError::ArityMismatch {
            signature: descriptor.signature().to_string(),
            expected: descriptor.len(),
            actual,
        });
    }
    Ok(())
}
