//! Static descriptions of CBOR records
//!
//! Records on the ledger are encoded either as maps keyed by small integers or
//! as positional arrays. A layout is a `const` table describing each field of
//! such a record (its key or position, a human-readable name and whether it
//! must be present). Hand-written decoders walk the payload through a layout
//! so that every malformed shape is reported in the same way: unknown keys,
//! repeated keys, missing required fields and wrong array arity.
//!
//! Array layouts are checked when they are built: since optional fields are
//! only ever omitted from the tail of an array, an optional field can't be
//! declared before a required one. Declaring such a layout in a `const` fails
//! the build.
//!
//! ```
//! use tessera_codec::layout::{ArrayLayout, Field};
//!
//! const OUTPUT: ArrayLayout = ArrayLayout::new(
//!     "legacy output",
//!     &[
//!         Field::required(0, "address"),
//!         Field::required(1, "amount"),
//!         Field::optional(2, "datum_hash"),
//!     ],
//! );
//!
//! assert_eq!(OUTPUT.min_len(), 2);
//! assert_eq!(OUTPUT.max_len(), 3);
//! ```

use minicbor::{data::Type, decode::Error, Decoder};

/// A single field of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: u64,
    pub name: &'static str,
    pub required: bool,
}

impl Field {
    pub const fn required(key: u64, name: &'static str) -> Self {
        Self {
            key,
            name,
            required: true,
        }
    }

    pub const fn optional(key: u64, name: &'static str) -> Self {
        Self {
            key,
            name,
            required: false,
        }
    }
}

const fn keys_are_distinct(fields: &[Field]) -> bool {
    let mut i = 0;
    while i < fields.len() {
        if fields[i].key >= 64 {
            return false;
        }

        let mut j = i + 1;
        while j < fields.len() {
            if fields[i].key == fields[j].key {
                return false;
            }
            j += 1;
        }
        i += 1;
    }

    true
}

const fn optional_fields_trail(fields: &[Field]) -> bool {
    let mut seen_optional = false;
    let mut i = 0;

    while i < fields.len() {
        if fields[i].key != i as u64 {
            return false;
        }

        if fields[i].required && seen_optional {
            return false;
        }

        if !fields[i].required {
            seen_optional = true;
        }

        i += 1;
    }

    true
}

/// Layout of a record encoded as a map with integer keys
#[derive(Debug, Clone, Copy)]
pub struct MapLayout {
    pub record: &'static str,
    pub fields: &'static [Field],
}

impl MapLayout {
    pub const fn new(record: &'static str, fields: &'static [Field]) -> Self {
        assert!(
            keys_are_distinct(fields),
            "map layout keys must be distinct and lower than 64"
        );

        Self { record, fields }
    }

    pub fn field(&self, key: u64) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Walks the entries of a map, handing each value to `visit`
    ///
    /// The visitor is responsible for consuming exactly one value from the
    /// decoder. Unknown keys, repeated keys and absent required fields are
    /// reported as decoding errors naming the record and the field.
    pub fn decode_entries<'b, F>(&self, d: &mut Decoder<'b>, mut visit: F) -> Result<(), Error>
    where
        F: FnMut(&'static Field, &mut Decoder<'b>) -> Result<(), Error>,
    {
        let mut remaining = d.map()?;
        let mut seen = 0u64;

        loop {
            match remaining {
                Some(0) => break,
                Some(n) => remaining = Some(n - 1),
                None => {
                    if d.datatype()? == Type::Break {
                        d.set_position(d.position() + 1);
                        break;
                    }
                }
            }

            let position = d.position();
            let key = d.u64()?;

            let field = self.field(key).ok_or_else(|| {
                Error::message(format!("unknown key {key} in {}", self.record)).at(position)
            })?;

            if seen & (1 << key) != 0 {
                return Err(Error::message(format!(
                    "duplicate key {key} ({}) in {}",
                    field.name, self.record
                ))
                .at(position));
            }

            seen |= 1 << key;
            visit(field, d)?;
        }

        match self
            .fields
            .iter()
            .find(|f| f.required && seen & (1 << f.key) == 0)
        {
            Some(missing) => Err(Error::message(format!(
                "missing required key {} ({}) in {}",
                missing.key, missing.name, self.record
            ))),
            None => Ok(()),
        }
    }
}

/// Layout of a record encoded as a positional array
#[derive(Debug, Clone, Copy)]
pub struct ArrayLayout {
    pub record: &'static str,
    pub fields: &'static [Field],
}

impl ArrayLayout {
    pub const fn new(record: &'static str, fields: &'static [Field]) -> Self {
        assert!(
            optional_fields_trail(fields),
            "array layout positions must be sequential with optional fields last"
        );

        Self { record, fields }
    }

    pub const fn min_len(&self) -> u64 {
        let mut count = 0;
        let mut i = 0;

        while i < self.fields.len() {
            if self.fields[i].required {
                count += 1;
            }
            i += 1;
        }

        count
    }

    pub const fn max_len(&self) -> u64 {
        self.fields.len() as u64
    }

    /// Reads an array header and checks that its arity fits this layout
    pub fn decode_header(&self, d: &mut Decoder<'_>) -> Result<u64, Error> {
        let position = d.position();

        match d.array()? {
            Some(len) if len >= self.min_len() && len <= self.max_len() => Ok(len),
            Some(len) => Err(Error::message(format!(
                "{} expects between {} and {} elements, found {len}",
                self.record,
                self.min_len(),
                self.max_len()
            ))
            .at(position)),
            None => Err(
                Error::message(format!("{} can't be an indefinite array", self.record))
                    .at(position),
            ),
        }
    }

    /// Number of elements to write given which optional fields are present
    ///
    /// `present` lists the presence of every field in declaration order;
    /// trailing absent fields are dropped.
    pub fn encoded_len(&self, present: &[bool]) -> u64 {
        let last = present.iter().rposition(|p| *p).map(|i| i + 1).unwrap_or(0);
        (last as u64).max(self.min_len())
    }
}
