//! The protocol tag table
//!
//! Root messages carry 4-byte ids and no parent context. Nested tags reuse
//! short ids freely; they are told apart by the tag they appear under.

use super::{TagDefinition, TagType};

macro_rules! tag {
    ($name:literal, [$($id:literal),+], $ty:ident, [$($ctx:literal),*]) => {
        TagDefinition {
            name: $name,
            id: &[$($id),+],
            tag_type: TagType::$ty,
            contexts: &[$($ctx),*],
        }
    };
}

/// Every tag known to the protocol
pub static DEFINITIONS: &[TagDefinition] = &[
    // Messages
    tag!("ModificationRequest", [0x1e, 0x54, 0x49, 0x45], Container, []),
    tag!("ModificationResponse", [0x1f, 0x54, 0x49, 0x45], Container, []),
    tag!("RecollectionRequest", [0x11, 0x54, 0x49, 0x45], Container, []),
    tag!("RecollectionResponse", [0x12, 0x54, 0x49, 0x45], Container, []),
    tag!("BillingRequest", [0x11, 0x50, 0x41, 0x59], Container, []),
    tag!("BillingResponse", [0x12, 0x50, 0x41, 0x59], Container, []),
    tag!("Error", [0x7f, 0xff], Container, []),

    // Results
    tag!("RecollectionResult", [0xa1], Container, ["RecollectionResponse"]),
    tag!("RecollectionCompute", [0xc1], Container, ["RecollectionResult"]),
    tag!("ComputeField", [0xc1], Container, ["RecollectionCompute"]),
    tag!("ModificationResult", [0xe1], Container, ["ModificationResponse"]),
    tag!("ModificationError", [0xef], Container, ["ModificationResponse"]),
    tag!("EntryHash", [0x80], Binary, ["ModificationResult", "ModificationError"]),
    tag!("ErrorMessage", [0xe0], Utf8, ["Error", "ModificationError"]),

    // Query
    tag!("RetrieveList", [0x83], Container, ["RecollectionRequest"]),
    tag!("RetField", [0xd0], Utf8, ["RetrieveList"]),
    tag!("RetCompute", [0xc1], Container, ["RetrieveList"]),
    tag!("RetComputeAlias", [0xa0], Utf8, ["RetCompute"]),
    tag!("RetComputeType", [0xa2], Ascii, ["RetCompute"]),
    tag!("FunctionName", [0xf0], Utf8, ["RetCompute", "FunArgumentFunction", "Filter"]),
    tag!("FunArgumentFunction", [0xf3], Container, ["RetCompute", "FunArgumentFunction", "Filter"]),
    tag!("FunArgumentReference", [0xf2], Utf8, ["RetCompute", "FunArgumentFunction", "Filter"]),
    tag!("FunArgumentStatic", [0xf1], Container, ["RetCompute", "FunArgumentFunction", "Filter"]),
    tag!("ArgStaticType", [0x80], Ascii, ["FunArgumentStatic"]),
    tag!("ArgStaticValue", [0x82], Binary, ["FunArgumentStatic"]),
    tag!("FilterList", [0xa3], Container, ["RecollectionRequest"]),
    tag!("Filter", [0xf1], Container, ["FilterList"]),
    tag!("FilterField", [0xe0], Utf8, ["Filter"]),

    // Request envelope fields
    tag!("Test", [0x86], Signed, ["ModificationRequest"]),
    tag!("Consistency", [0xee], Unsigned, ["ModificationRequest", "RecollectionRequest"]),
    tag!(
        "MessageId",
        [0xec],
        Unsigned,
        [
            "ModificationRequest",
            "ModificationResponse",
            "RecollectionRequest",
            "RecollectionResponse",
            "BillingRequest",
            "BillingResponse",
            "Error"
        ]
    ),

    // Signing
    tag!("Signature", [0xfe], Binary, ["EntryHeader", "Cheque"]),
    tag!("Signer", [0xfc], Binary, ["EntryHeader", "Cheque"]),
    tag!("TablespaceName", [0x80], Utf8, ["RecollectionRequest", "EntryHeader", "Cheque"]),
    tag!("TableName", [0x82], Utf8, ["RecollectionRequest", "EntryHeader", "Cheque"]),

    // Entries
    tag!("Entry", [0xe1], Container, ["ModificationRequest", "RecollectionResult"]),
    tag!("EntryHeader", [0xe1], Container, ["Entry"]),
    tag!("EntryTimestamp", [0x86], Date, ["EntryHeader"]),
    tag!("EntryVersion", [0x88], Unsigned, ["EntryHeader"]),
    tag!("EntryOldHash", [0x8a], Binary, ["EntryHeader"]),
    tag!("EntryFldHash", [0x8c], Binary, ["EntryHeader"]),
    tag!("EntryNetwork", [0x8e], Unsigned, ["EntryHeader"]),

    // Fields
    tag!("FieldList", [0xd1], Container, ["Entry"]),
    tag!("Field", [0xd1], Container, ["FieldList"]),
    tag!("FieldName", [0x80], Utf8, ["Field", "ComputeField"]),
    tag!("FieldType", [0x82], Ascii, ["Field", "ComputeField"]),
    tag!("FieldHash", [0x84], Binary, ["Field", "ComputeField"]),
    tag!("FieldValue", [0x86], Binary, ["Field", "ComputeField"]),

    // Cheques
    tag!("ChequeList", [0xc1], Container, ["Entry", "BillingResponse"]),
    tag!("Cheque", [0xc1], Container, ["ChequeList"]),
    tag!("ChequeVersion", [0xc0], Unsigned, ["Cheque"]),
    tag!("ChequeNetwork", [0xc2], Unsigned, ["Cheque"]),
    tag!("ChequeSession", [0xc4], Binary, ["Cheque"]),
    tag!("ChequeNumber", [0xc6], Unsigned, ["Cheque"]),
    tag!("ChequeCropAmount", [0xc8], Unsigned, ["Cheque"]),

    // Billing
    tag!("BillingCountLimit", [0x80], Unsigned, ["BillingRequest"]),
    tag!("BillingAmountThreshold", [0x82], Unsigned, ["BillingRequest"]),
];
