//! Tag tree ⇄ bytes
//!
//! Encoding is a depth-first walk emitting `id ‖ size ‖ payload` for every
//! tag; a container's payload is the encoding of its children. Decoding reads
//! a whole message from a complete buffer, resolving each id against the tag it
//! appears under.

use bytes::{BufMut, BytesMut};
use log::trace;

use super::vint::{put_vint, read_id, read_vint};
use super::Tag;
use crate::error::{CoreError, Result};
use crate::schema::registry;

/// Encode a tag tree to bytes
pub fn encode(tag: &Tag) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    write_tag(&mut buf, tag)?;
    Ok(buf.to_vec())
}

fn write_tag(buf: &mut BytesMut, tag: &Tag) -> Result<()> {
    buf.put_slice(tag.definition().id);

    if tag.is_container() {
        let mut body = BytesMut::new();
        for child in tag.children() {
            write_tag(&mut body, child)?;
        }
        put_vint(buf, body.len() as u64)?;
        buf.put_slice(&body);
    } else {
        let data = tag.data()?;
        put_vint(buf, data.len() as u64)?;
        buf.put_slice(&data);
    }

    Ok(())
}

/// Decode one complete message
///
/// Fails with a parse error on truncated input, a tag overrunning its parent,
/// an id not valid in its context, or bytes left after the root tag.
pub fn decode(input: &[u8]) -> Result<Tag> {
    let registry = registry()?;
    let mut open: Vec<(Tag, usize)> = Vec::new();
    let mut root: Option<Tag> = None;
    let mut pos = 0;

    while pos < input.len() {
        if root.is_some() {
            return Err(CoreError::Parse(format!(
                "{} trailing bytes after message",
                input.len() - pos
            )));
        }

        let parent = open.last().map(|(tag, _)| tag.name());
        let id = read_id(&input[pos..])?;
        let definition = registry.resolve(parent, id).ok_or_else(|| {
            CoreError::Parse(format!(
                "Unknown tag id {} under {}",
                hex::encode(id),
                parent.unwrap_or("message root")
            ))
        })?;

        let (size, size_width) = read_vint(&input[pos + id.len()..])?;
        let start = pos + id.len() + size_width;
        let limit = open.last().map_or(input.len(), |(_, end)| *end);
        let end = usize::try_from(size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .filter(|end| *end <= limit)
            .ok_or_else(|| {
                CoreError::Parse(format!(
                    "{} of {} bytes overruns its parent at offset {}",
                    definition.name, size, pos
                ))
            })?;

        trace!("{} at {}..{}", definition.name, start, end);

        if definition.tag_type.is_container() {
            open.push((Tag::from_definition(definition), end));
            pos = start;
        } else {
            let leaf = Tag::from_raw(definition, input[start..end].to_vec());
            attach(&mut open, &mut root, leaf);
            pos = end;
        }

        while open.last().map_or(false, |(_, end)| *end == pos) {
            if let Some((finished, _)) = open.pop() {
                attach(&mut open, &mut root, finished);
            }
        }
    }

    if let Some((unfinished, end)) = open.last() {
        return Err(CoreError::Parse(format!(
            "Truncated message: {} expects {} more bytes",
            unfinished.name(),
            end - pos
        )));
    }

    root.ok_or_else(|| CoreError::Parse("Empty message".to_string()))
}

fn attach(open: &mut [(Tag, usize)], root: &mut Option<Tag>, tag: Tag) {
    match open.last_mut() {
        Some((parent, _)) => {
            parent.push_child(tag);
        }
        None => *root = Some(tag),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A RecollectionResponse captured from a development node
    pub(crate) const CAPTURED_RESPONSE: &str =
        include_str!("../../testdata/recollection_response.hex");

    pub(crate) fn captured_response() -> Vec<u8> {
        hex::decode(CAPTURED_RESPONSE.trim()).unwrap()
    }

    #[test]
    fn test_captured_response_decodes() {
        let message = decode(&captured_response()).unwrap();
        assert_eq!(message.name(), "RecollectionResponse");
        assert_eq!(message.child_unsigned("MessageId").unwrap(), 2);

        let result = message.required_child("RecollectionResult").unwrap();
        let entry = result.required_child("Entry").unwrap();
        let header = entry.required_child("EntryHeader").unwrap();
        assert_eq!(header.child_text("TablespaceName").unwrap(), "client-dev.test");
        assert_eq!(header.child_text("TableName").unwrap(), "all_types");
        assert_eq!(header.child_unsigned("EntryVersion").unwrap(), 1);
        assert_eq!(header.child_unsigned("EntryNetwork").unwrap(), 60);
        assert_eq!(
            hex::encode(header.child_data("Signer").unwrap()),
            "ae65baf610bad3f0d71aa3c3a8110c2d62cbeb19"
        );

        let fields = entry.required_child("FieldList").unwrap();
        assert_eq!(fields.children_named("Field").count(), 9);

        let compute = result.required_child("RecollectionCompute").unwrap();
        assert_eq!(compute.children_named("ComputeField").count(), 4);
    }

    #[test]
    fn test_captured_response_reencodes_byte_equal() {
        let bytes = captured_response();
        let message = decode(&bytes).unwrap();
        assert_eq!(encode(&message).unwrap(), bytes);
    }

    #[test]
    fn test_built_tree_round_trip() {
        let mut request = Tag::new("RecollectionRequest").unwrap();
        request.add_value("Consistency", 0x32u64).unwrap();
        request.add_value("MessageId", 7u64).unwrap();
        request.add_value("TablespaceName", "ts").unwrap();
        request.add_value("TableName", "tbl").unwrap();
        request
            .add_container("RetrieveList")
            .unwrap()
            .add_value("RetField", "Id")
            .unwrap();
        request.add_container("FilterList").unwrap();

        let bytes = encode(&request).unwrap();
        assert_eq!(&bytes[..4], &[0x11, 0x54, 0x49, 0x45]);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.child("FilterList").unwrap().children().len(), 0);
    }

    #[test]
    fn test_leaf_layout() {
        let mut message = Tag::new("Error").unwrap();
        message.add_value("ErrorMessage", "no").unwrap();
        assert_eq!(hex::encode(encode(&message).unwrap()), "7fff84e0826e6f");
    }

    #[test]
    fn test_truncated_input_rejected() {
        let bytes = captured_response();
        for cut in [1, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                matches!(decode(&bytes[..cut]), Err(CoreError::Parse(_))),
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = captured_response();
        bytes.push(0x80);
        assert!(matches!(decode(&bytes), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_tag_in_wrong_context_rejected() {
        // BillingResponse { ChequeList { 0x80 } }: 0x80 is not defined under ChequeList
        let bytes = hex::decode("1250415985c183808100").unwrap();
        assert!(matches!(decode(&bytes), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_eight_byte_sizes() {
        // BillingRequest with an empty body, size written as an 8 byte vint
        let message = decode(&hex::decode("115041590100000000000000").unwrap()).unwrap();
        assert_eq!(message.name(), "BillingRequest");
        assert!(message.children().is_empty());

        let bytes = hex::decode("115041590100000000000005").unwrap();
        assert!(matches!(decode(&bytes), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_unknown_root_rejected() {
        assert!(matches!(decode(&[0xe1, 0x80]), Err(CoreError::Parse(_))));
        assert!(matches!(decode(&[]), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_child_overrunning_parent_rejected() {
        // Error(3) { ErrorMessage(5) ... }
        let bytes = hex::decode("7fff83e0856e6f").unwrap();
        assert!(matches!(decode(&bytes), Err(CoreError::Parse(_))));
    }
}
