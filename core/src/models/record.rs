//! Records and their signed entries
//!
//! A [`Record`] is one version of a table row. Fields live in a sparse
//! position map so that rows read back from a query keep the column positions
//! the query asked for; the name index is derived from it and rebuilt on
//! every removal. Hashing and signing never look at positions: the entry
//! always lists non-computed fields in lexicographic name order.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::debug;

use super::field::Field;
use crate::config::EntryConfig;
use crate::crypto::{KeccakHasher, SecureHasher, SignerKey};
use crate::error::{CoreError, Result};
use crate::integrity::{check_entry, sign_header};
use crate::query::ColumnsOrder;
use crate::tag::Tag;
use crate::types::{Value, ValueCodec, ValueType};

/// Where [`Record::put_field`] stores a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// After the last occupied position
    Next,
    /// Exactly at this position, replacing any field there
    At(usize),
    /// At this position or after the last occupied one, whichever is later
    After(usize),
}

/// One version of a row
#[derive(Debug, Clone)]
pub struct Record {
    tablespace: String,
    table: String,
    prev_version: i64,
    prev_hash: Option<[u8; 32]>,
    signer: Option<Address>,
    codec: ValueCodec,
    fields: BTreeMap<usize, Field>,
    by_name: HashMap<String, Vec<usize>>,
}

impl Record {
    /// An empty first version of a row
    pub fn new(tablespace: &str, table: &str) -> Self {
        Self {
            tablespace: tablespace.to_string(),
            table: table.to_string(),
            prev_version: 0,
            prev_hash: None,
            signer: None,
            codec: ValueCodec::default(),
            fields: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Use `codec` for fields added from now on
    pub fn with_codec(mut self, codec: ValueCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Tablespace name
    pub fn tablespace(&self) -> &str {
        &self.tablespace
    }

    /// Table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Version this record supersedes; `-1` marks a deletion
    pub fn prev_version(&self) -> i64 {
        self.prev_version
    }

    /// Header hash of the superseded version
    pub fn prev_hash(&self) -> Option<&[u8; 32]> {
        self.prev_hash.as_ref()
    }

    /// Signer of the entry this record was read from
    pub fn signer(&self) -> Option<Address> {
        self.signer
    }

    /// Chain this record to an earlier version
    pub fn set_previous(&mut self, version: i64, hash: Option<[u8; 32]>) {
        self.prev_version = version;
        self.prev_hash = hash;
    }

    /// Whether the next entry is a tombstone
    pub fn is_deleted(&self) -> bool {
        self.prev_version < 0
    }

    /// Number of fields, computed ones included
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn next_position(&self) -> usize {
        self.fields.keys().next_back().map_or(0, |last| last + 1)
    }

    fn unindex(&mut self, position: usize, name: &str) {
        if let Some(positions) = self.by_name.get_mut(name) {
            positions.retain(|p| *p != position);
            if positions.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        for (position, field) in &self.fields {
            self.by_name
                .entry(field.name().to_string())
                .or_default()
                .push(*position);
        }
    }

    /// Store a field; returns the position it was stored at
    pub fn put_field(&mut self, field: Field, placement: Placement) -> usize {
        let position = match placement {
            Placement::Next => self.next_position(),
            Placement::At(position) => position,
            Placement::After(position) => position.max(self.next_position()),
        };
        if let Some(old) = self.fields.remove(&position) {
            let name = old.name().to_string();
            self.unindex(position, &name);
        }

        let positions = self.by_name.entry(field.name().to_string()).or_default();
        positions.push(position);
        positions.sort_unstable();
        self.fields.insert(position, field);
        position
    }

    fn stored_position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name)?.iter().copied().find(|position| {
            self.fields
                .get(position)
                .is_some_and(|field| !field.is_computed())
        })
    }

    fn put(&mut self, field: Field) -> usize {
        let placement = match self.stored_position(field.name()) {
            Some(position) => Placement::At(position),
            None => Placement::Next,
        };
        self.put_field(field.with_codec(self.codec), placement)
    }

    /// Set a field from a value, replacing a stored field of the same name
    pub fn put_value(
        &mut self,
        name: &str,
        value_type: ValueType,
        value: impl Into<Value>,
    ) -> usize {
        self.put(Field::from_value(name, value_type, value.into()))
    }

    /// Set a field from encoded bytes, replacing a stored field of the same name
    pub fn put_bytes(&mut self, name: &str, value_type: ValueType, bytes: Vec<u8>) -> usize {
        self.put(Field::from_bytes(name, value_type, bytes))
    }

    /// Withhold a field's value, keeping only its field hash
    pub fn put_hash(&mut self, name: &str, value_type: ValueType, hash: [u8; 32]) -> usize {
        self.put(Field::from_hash(name, value_type, hash))
    }

    /// First field named `name`
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        let position = self.by_name.get(name)?.first()?;
        self.fields.get(position)
    }

    /// First field named `name`, mutably
    pub fn get_field_mut(&mut self, name: &str) -> Option<&mut Field> {
        let position = *self.by_name.get(name)?.first()?;
        self.fields.get_mut(&position)
    }

    /// Every field named `name`, in position order
    pub fn get_fields(&self, name: &str) -> Vec<&Field> {
        self.by_name
            .get(name)
            .map(|positions| positions.iter().filter_map(|p| self.fields.get(p)).collect())
            .unwrap_or_default()
    }

    /// Field at a position
    pub fn field_at(&self, position: usize) -> Option<&Field> {
        self.fields.get(&position)
    }

    /// Fields with their positions, in position order
    pub fn fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields.iter().map(|(position, field)| (*position, field))
    }

    /// Decoded value of the first field named `name`
    pub fn get_value(&mut self, name: &str) -> Result<Option<&Value>> {
        let Some(position) = self.by_name.get(name).and_then(|p| p.first().copied()) else {
            return Ok(None);
        };
        match self.fields.get_mut(&position) {
            Some(field) => field.value().map(Some),
            None => Ok(None),
        }
    }

    /// Names of the fields that go into an entry, in signing order
    pub fn sorted_field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .values()
            .filter(|field| !field.is_computed())
            .map(Field::name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Build the `FieldList` and its aggregate fields hash
    pub fn field_list(&mut self) -> Result<(Tag, [u8; 32])> {
        let mut positions: Vec<usize> = self
            .fields
            .iter()
            .filter(|(_, field)| !field.is_computed())
            .map(|(position, _)| *position)
            .collect();
        positions.sort_by(|a, b| self.fields[a].name().cmp(self.fields[b].name()));

        let mut list = Tag::new("FieldList")?;
        let mut hasher = KeccakHasher::new();
        for position in positions {
            let Some(field) = self.fields.get_mut(&position) else {
                continue;
            };
            hasher.update(&field.field_hash()?);
            list.add_child(field.to_tag()?)?;
        }
        Ok((list, hasher.finalize()))
    }

    /// Sign the next version of this record, timestamped now
    pub fn get_entry(&mut self, key: &SignerKey, config: &EntryConfig) -> Result<Tag> {
        self.build_entry(key, config, Utc::now())
    }

    /// Sign the next version of this record with an explicit timestamp
    pub fn build_entry(
        &mut self,
        key: &SignerKey,
        config: &EntryConfig,
        timestamp: DateTime<Utc>,
    ) -> Result<Tag> {
        let version = u64::try_from(self.prev_version + 1).map_err(|_| {
            CoreError::InvalidValue(format!("Invalid previous version {}", self.prev_version))
        })?;
        let (list, fields_hash) = self.field_list()?;

        let mut header = Tag::new("EntryHeader")?;
        header.add_value("TablespaceName", self.tablespace.as_str())?;
        header.add_value("TableName", self.table.as_str())?;
        header.add_value("EntryTimestamp", timestamp)?;
        header.add_value("EntryVersion", version)?;
        header.add_data("EntryFldHash", fields_hash.to_vec())?;
        if let Some(prev_hash) = self.prev_hash {
            header.add_data("EntryOldHash", prev_hash.to_vec())?;
        }
        header.add_value("EntryNetwork", config.network)?;
        header.add_data("Signer", key.address().as_bytes().to_vec())?;
        let hash = sign_header(&mut header, key)?;
        debug!(
            "Signed {}.{} version {} as {}",
            self.tablespace,
            self.table,
            version,
            hex::encode(hash)
        );

        let mut entry = Tag::new("Entry")?;
        entry.add_child(header)?;
        entry.add_child(list)?;
        Ok(entry)
    }

    /// Load a verified entry into this record
    ///
    /// The record takes the entry's table, version and signer, and chains to
    /// the entry's header hash. Fields land at the position `order` gives
    /// their name, or after every requested column if the name is unknown.
    pub fn fill_from_entry(&mut self, entry: &Tag, order: Option<&ColumnsOrder>) -> Result<()> {
        let hash = check_entry(entry)?;
        let header = entry.required_child("EntryHeader")?;

        let signer = header.child_data("Signer")?;
        if signer.len() != Address::len_bytes() {
            return Err(CoreError::Parse(format!(
                "Signer must be {} bytes, got {}",
                Address::len_bytes(),
                signer.len()
            )));
        }
        let version = header.child_unsigned("EntryVersion")?;
        let prev_version = i64::try_from(version)
            .map_err(|_| CoreError::Parse(format!("EntryVersion {} out of range", version)))?;
        let tablespace = header.child_text("TablespaceName")?;
        let table = header.child_text("TableName")?;

        let mut fields = Vec::new();
        if let Some(list) = entry.child("FieldList") {
            for tag in list.children_named("Field") {
                let field = Field::from_tag(tag, self.codec)?;
                let placement = match order {
                    Some(order) => match order.fields.get(field.name()) {
                        Some(position) => Placement::At(*position),
                        None => Placement::After(order.total),
                    },
                    None => Placement::Next,
                };
                fields.push((field, placement));
            }
        }

        self.tablespace = tablespace;
        self.table = table;
        self.prev_version = prev_version;
        self.prev_hash = Some(hash);
        self.signer = Some(Address::from_slice(&signer));
        for (field, placement) in fields {
            self.put_field(field, placement);
        }
        Ok(())
    }

    /// Load the computed columns of a result; the i-th one lands at the
    /// position of the i-th computed column of `order`
    pub fn fill_from_computed(
        &mut self,
        compute: &Tag,
        order: Option<&ColumnsOrder>,
    ) -> Result<()> {
        let fields = compute
            .children_named("ComputeField")
            .map(|tag| Field::from_tag(tag, self.codec))
            .collect::<Result<Vec<_>>>()?;

        for (i, field) in fields.into_iter().enumerate() {
            let placement = match order {
                Some(order) => match order.computed.get(i) {
                    Some(position) => Placement::At(*position),
                    None => Placement::After(order.total),
                },
                None => Placement::Next,
            };
            self.put_field(field, placement);
        }
        Ok(())
    }

    /// Build a record from one `RecollectionResult`
    pub fn from_recollection_result(
        result: &Tag,
        order: Option<&ColumnsOrder>,
        codec: ValueCodec,
    ) -> Result<Self> {
        let mut record = Record::new("", "").with_codec(codec);
        record.fill_from_entry(result.required_child("Entry")?, order)?;
        if let Some(compute) = result.child("RecollectionCompute") {
            record.fill_from_computed(compute, order)?;
        }
        Ok(record)
    }

    /// Turn the next version into a tombstone that keeps only the key fields
    pub fn delete(&mut self, key_fields: &[&str]) {
        self.prev_version = -1;
        self.fields
            .retain(|_, field| !field.is_computed() && key_fields.contains(&field.name()));
        self.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;
    use crate::tag::codec::tests::captured_response;
    use crate::tag::{decode, encode};
    use chrono::TimeZone;
    use rstest::rstest;

    fn sample_record() -> Record {
        let mut record = Record::new("client-dev.test", "all_types");
        record.put_value("fLong", ValueType::Long, -5i64);
        record.put_value("Id", ValueType::Uuid, uuid::Uuid::nil());
        record.put_value("fString", ValueType::String, "строка");
        record.put_value("fBoolean", ValueType::Boolean, true);
        record
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn captured_result() -> Tag {
        decode(&captured_response())
            .unwrap()
            .required_child("RecollectionResult")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_entry_verifies() {
        let key = SignerKey::random();
        let mut record = sample_record();
        let entry = record.build_entry(&key, &EntryConfig::default(), timestamp()).unwrap();
        check_entry(&entry).unwrap();

        let header = entry.child("EntryHeader").unwrap();
        let names: Vec<_> = header.children().iter().map(Tag::name).collect();
        assert_eq!(
            names,
            [
                "TablespaceName",
                "TableName",
                "EntryTimestamp",
                "EntryVersion",
                "EntryFldHash",
                "EntryNetwork",
                "Signer",
                "Signature"
            ]
        );
        assert_eq!(header.child_unsigned("EntryVersion").unwrap(), 1);
        assert_eq!(header.child_unsigned("EntryNetwork").unwrap(), 60);
    }

    #[test]
    fn test_fields_sorted_by_name() {
        let key = SignerKey::random();
        let entry = sample_record()
            .build_entry(&key, &EntryConfig::default(), timestamp())
            .unwrap();
        let names: Vec<String> = entry
            .child("FieldList")
            .unwrap()
            .children()
            .iter()
            .map(|field| field.child_text("FieldName").unwrap())
            .collect();
        assert_eq!(names, ["Id", "fBoolean", "fLong", "fString"]);
    }

    #[rstest]
    #[case(&[0, 1, 2, 3])]
    #[case(&[3, 2, 1, 0])]
    #[case(&[2, 0, 3, 1])]
    fn test_fields_hash_ignores_insertion_order(#[case] order: &[usize]) {
        let values: [(&str, Value); 4] = [
            ("a", Value::Long(1)),
            ("b", Value::from("two")),
            ("c", Value::Binary(vec![3])),
            ("d", Value::Boolean(false)),
        ];
        let mut record = Record::new("ts", "t");
        for i in order {
            let (name, value) = &values[*i];
            record.put_value(name, value.value_type(), value.clone());
        }

        let mut reference = Record::new("ts", "t");
        for (name, value) in &values {
            reference.put_value(name, value.value_type(), value.clone());
        }
        assert_eq!(record.field_list().unwrap().1, reference.field_list().unwrap().1);
    }

    #[test]
    fn test_tampered_field_rejected() {
        let key = SignerKey::random();
        let entry = sample_record()
            .build_entry(&key, &EntryConfig::default(), timestamp())
            .unwrap();
        let mut request = Tag::new("ModificationRequest").unwrap();
        request.add_child(entry).unwrap();
        let mut bytes = encode(&request).unwrap();
        let needle = "строка".as_bytes();
        let offset = bytes.windows(needle.len()).position(|w| w == needle).unwrap();
        bytes[offset] ^= 0x01;

        let tampered = decode(&bytes).unwrap();
        let entry = tampered.child("Entry").unwrap();
        assert!(matches!(check_entry(entry), Err(CoreError::Integrity(_))));
    }

    #[test]
    fn test_put_value_replaces_in_place() {
        let mut record = Record::new("ts", "t");
        let first = record.put_value("a", ValueType::Long, 1i64);
        record.put_value("b", ValueType::Long, 2i64);
        let again = record.put_value("a", ValueType::String, "one");
        assert_eq!(first, again);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get_value("a").unwrap(), Some(&Value::from("one")));
        assert_eq!(record.get_value("missing").unwrap(), None);
    }

    #[test]
    fn test_placement() {
        let mut record = Record::new("ts", "t");
        let field = |name: &str| Field::from_value(name, ValueType::Long, Value::Long(0));

        assert_eq!(record.put_field(field("a"), Placement::At(3)), 3);
        assert_eq!(record.put_field(field("b"), Placement::Next), 4);
        assert_eq!(record.put_field(field("c"), Placement::After(2)), 5);
        assert_eq!(record.put_field(field("d"), Placement::After(9)), 9);
        assert_eq!(record.put_field(field("e"), Placement::At(3)), 3);

        assert!(record.get_field("a").is_none());
        assert_eq!(record.field_at(3).unwrap().name(), "e");
        let positions: Vec<_> = record.fields().map(|(p, _)| p).collect();
        assert_eq!(positions, [3, 4, 5, 9]);
    }

    #[test]
    fn test_delete_keeps_key_fields() {
        let key = SignerKey::random();
        let mut record = sample_record();
        record.set_previous(4, Some([1; 32]));
        record.delete(&["Id"]);
        assert!(record.is_deleted());
        assert_eq!(record.sorted_field_names(), ["Id"]);
        assert!(record.get_field("fLong").is_none());

        let entry = record.build_entry(&key, &EntryConfig::default(), timestamp()).unwrap();
        check_entry(&entry).unwrap();
        let header = entry.child("EntryHeader").unwrap();
        assert_eq!(header.child_unsigned("EntryVersion").unwrap(), 0);
        assert_eq!(header.child_data("EntryOldHash").unwrap(), vec![1; 32]);
    }

    #[test]
    fn test_empty_record_entry() {
        let key = SignerKey::random();
        let mut record = Record::new("ts", "t");
        let entry = record.build_entry(&key, &EntryConfig::default(), timestamp()).unwrap();
        let declared = entry.child("EntryHeader").unwrap().child_data("EntryFldHash").unwrap();
        assert_eq!(declared, keccak256(&[]).to_vec());
        check_entry(&entry).unwrap();
    }

    #[test]
    fn test_withheld_field_keeps_entry_valid() {
        let key = SignerKey::random();
        let mut full = sample_record();
        let entry = full.build_entry(&key, &EntryConfig::default(), timestamp()).unwrap();
        let fields_hash = entry.child("EntryHeader").unwrap().child_data("EntryFldHash").unwrap();

        let mut withheld = sample_record();
        let hash = withheld.get_field_mut("fString").unwrap().field_hash().unwrap();
        withheld.put_hash("fString", ValueType::String, hash);
        let (_, hash) = withheld.field_list().unwrap();
        assert_eq!(hash.to_vec(), fields_hash);
    }

    #[test]
    fn test_from_captured_result() {
        let result = captured_result();
        let record =
            Record::from_recollection_result(&result, None, ValueCodec::default()).unwrap();

        assert_eq!(record.tablespace(), "client-dev.test");
        assert_eq!(record.table(), "all_types");
        assert_eq!(
            hex::encode(record.signer().unwrap().as_bytes()),
            "ae65baf610bad3f0d71aa3c3a8110c2d62cbeb19"
        );
        assert_eq!(record.len(), 13);
        assert_eq!(record.get_fields("TestValue").len(), 4);
        assert!(record.get_fields("TestValue").iter().all(|f| f.is_computed()));
        assert_eq!(
            record.sorted_field_names(),
            [
                "Id",
                "fBinary",
                "fBoolean",
                "fDecimal",
                "fDouble",
                "fDuration",
                "fFloat",
                "fInteger",
                "fString"
            ]
        );

        let header = result.child("Entry").unwrap().child("EntryHeader").unwrap();
        let version = header.child_unsigned("EntryVersion").unwrap();
        assert_eq!(record.prev_version(), version as i64);
    }

    #[test]
    fn test_captured_record_chains_next_version() {
        let result = captured_result();
        let entry = result.child("Entry").unwrap();
        let header = entry.child("EntryHeader").unwrap();
        let captured_hash = check_entry(entry).unwrap();

        let mut record =
            Record::from_recollection_result(&result, None, ValueCodec::default()).unwrap();
        let key = SignerKey::random();
        let next = record.build_entry(&key, &EntryConfig::default(), timestamp()).unwrap();
        check_entry(&next).unwrap();

        let next_header = next.child("EntryHeader").unwrap();
        assert_eq!(
            next_header.child_unsigned("EntryVersion").unwrap(),
            header.child_unsigned("EntryVersion").unwrap() + 1
        );
        assert_eq!(next_header.child_data("EntryOldHash").unwrap(), captured_hash.to_vec());
        assert_eq!(
            next_header.child_data("EntryFldHash").unwrap(),
            header.child_data("EntryFldHash").unwrap()
        );
        assert!(next.child("FieldList").unwrap().children().len() == 9);
    }

    #[test]
    fn test_column_order_placement() {
        let result = captured_result();
        let order = ColumnsOrder {
            fields: HashMap::from([("fString".to_string(), 0), ("Id".to_string(), 2)]),
            computed: vec![1, 3],
            total: 4,
        };
        let record = Record::from_recollection_result(&result, Some(&order), ValueCodec::default())
            .unwrap();

        assert_eq!(record.field_at(0).unwrap().name(), "fString");
        assert_eq!(record.field_at(2).unwrap().name(), "Id");
        assert!(record.field_at(1).unwrap().is_computed());
        assert!(record.field_at(3).unwrap().is_computed());

        let positions: Vec<_> = record.fields().map(|(p, _)| p).collect();
        assert_eq!(positions, (0..13).collect::<Vec<_>>());
        assert!(record.fields().skip(4).take(7).all(|(_, f)| !f.is_computed()));
    }

    #[test]
    fn test_unreadable_field_leaves_record_untouched() {
        let mut result = captured_result();
        let list = result.child_mut("Entry").unwrap().child_mut("FieldList").unwrap();
        list.child_mut("Field")
            .unwrap()
            .child_mut("FieldType")
            .unwrap()
            .set_data(b"nonsense".to_vec())
            .unwrap();
        let entry = result.child("Entry").unwrap();
        check_entry(entry).unwrap();

        let mut record = Record::new("ts", "t");
        record.set_previous(3, Some([1; 32]));
        record.put_value("a", ValueType::Long, 1i64);

        assert!(record.fill_from_entry(entry, None).is_err());
        assert_eq!((record.tablespace(), record.table()), ("ts", "t"));
        assert_eq!(record.prev_version(), 3);
        assert_eq!(record.prev_hash(), Some(&[1; 32]));
        assert_eq!(record.signer(), None);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_tampered_result_rejected() {
        let mut result = captured_result();
        let entry = result.child_mut("Entry").unwrap();
        let header = entry.child_mut("EntryHeader").unwrap();
        header.child_mut("TableName").unwrap().set_data(b"other".to_vec()).unwrap();
        let err =
            Record::from_recollection_result(&result, None, ValueCodec::default()).unwrap_err();
        assert!(err.is_rejection());
    }
}
