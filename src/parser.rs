//! Deserialize data from the management wire protocol.
use bytes::Bytes;
use nom::{
    IResult,
    bytes::complete::take,
    multi::many_m_n,
    number::complete::{be_i32, be_u16},
};
use nombytes::NomBytes;

use crate::constants::{MAX_BLOB_LENGTH, MAX_GROUP_COUNT};

/// Convert bytes to a validated UTF-8 string.
/// Returns an error if the bytes are not valid UTF-8.
pub fn bytes_to_string(bytes: &Bytes) -> Result<String, nom::Err<nom::error::Error<NomBytes>>> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| {
            nom::Err::Failure(nom::error::Error::new(
                NomBytes::from(bytes.as_ref()),
                nom::error::ErrorKind::Verify,
            ))
        })
}

/// Parse an i16-length-prefixed string's raw bytes.
pub fn parse_string(s: NomBytes) -> IResult<NomBytes, Bytes> {
    let (s, length) = be_u16(s)?;
    let (s, string) = take(length)(s)?;
    Ok((s, string.into_bytes()))
}

/// Parse an i32-length-prefixed byte blob.
///
/// Rejects negative lengths and lengths above [`MAX_BLOB_LENGTH`] before any
/// allocation happens.
pub fn parse_blob(s: NomBytes) -> IResult<NomBytes, Bytes> {
    let (s, length) = be_i32(s)?;

    if !(0..=MAX_BLOB_LENGTH).contains(&length) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            s,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (s, blob) = take(length as usize)(s)?;
    Ok((s, blob.into_bytes()))
}

/// Parse an i32-count-prefixed repeated group, applying `f` per entry.
pub fn parse_group<O, E, F>(f: F) -> impl FnMut(NomBytes) -> IResult<NomBytes, Vec<O>, E>
where
    F: nom::Parser<NomBytes, O, E> + Copy,
    E: nom::error::ParseError<NomBytes>,
{
    move |input: NomBytes| {
        let (i, count) = be_i32(input)?;

        // Validate group size bounds
        if !(0..=MAX_GROUP_COUNT).contains(&count) {
            return Err(nom::Err::Failure(E::from_error_kind(
                i,
                nom::error::ErrorKind::TooLarge,
            )));
        }

        many_m_n(count as usize, count as usize, f)(i)
    }
}

/// Skip `n` bytes of input.
///
/// Used to step over unknown trailing fixed-block fields written by a newer
/// schema version; the header's block length tells the decoder how far.
pub fn skip_bytes(s: NomBytes, n: usize) -> IResult<NomBytes, ()> {
    let (s, _) = take(n)(s)?;
    Ok((s, ()))
}
