//! Binary restart records.
//!
//! All integers and floats are little-endian. The layout is
//!
//! ```text
//! [magic "BDFR"][version u8][target order u32][field count u32]
//! per field: [kind u8][active order u32]
//!            [active order x f64 step sizes]
//!            [active order x (u64 length, length x f64 values)]
//! [time f64][step number u64]
//! ```
//!
//! Snapshots and step sizes are stored most recent first. The record carries
//! the raw values only; matching them against an operator's vector layout is
//! done on resume.

use std::io::{self, Read, Write};

use cadence_core::FieldKind;

use crate::{Error, coefficients::MAX_ORDER};

pub const MAGIC: [u8; 4] = *b"BDFR";
pub const FORMAT_VERSION: u8 = 1;

/// History of one field at a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub kind: FieldKind,
    /// Step sizes, most recent first; one per snapshot.
    pub dts: Vec<f64>,
    /// Snapshot values, most recent first.
    pub snapshots: Vec<Vec<f64>>,
}

/// Everything needed to continue a run bit-for-bit.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartState {
    /// Target order of the run that wrote the record.
    pub order: usize,
    pub fields: Vec<FieldRecord>,
    /// Time `t_n` at the checkpoint.
    pub time: f64,
    /// Number of the next step to take.
    pub step: usize,
}

impl RestartState {
    /// Encodes the record into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RestartFormat`] if the record is inconsistent.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        save(self, &mut buf)?;
        Ok(buf)
    }

    /// Decodes and validates a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RestartFormat`] if the bytes are not a valid record.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, Error> {
        load(&mut bytes)
    }
}

/// Writes a restart record.
///
/// # Errors
///
/// Returns [`Error::Io`] if writing fails, or [`Error::RestartFormat`] if a
/// field has a different number of step sizes than snapshots or a count does
/// not fit the on-disk integer width.
pub fn save(state: &RestartState, w: &mut dyn Write) -> Result<(), Error> {
    w.write_all(&MAGIC)?;
    w.write_all(&[FORMAT_VERSION])?;
    write_u32(w, state.order)?;
    write_u32(w, state.fields.len())?;

    for field in &state.fields {
        if field.dts.len() != field.snapshots.len() {
            return Err(Error::restart(format!(
                "{:?} has {} step sizes for {} snapshots",
                field.kind,
                field.dts.len(),
                field.snapshots.len()
            )));
        }
        w.write_all(&[kind_tag(field.kind)])?;
        write_u32(w, field.snapshots.len())?;
        for dt in &field.dts {
            w.write_all(&dt.to_le_bytes())?;
        }
        for snapshot in &field.snapshots {
            w.write_all(&(snapshot.len() as u64).to_le_bytes())?;
            for v in snapshot {
                w.write_all(&v.to_le_bytes())?;
            }
        }
    }

    w.write_all(&state.time.to_le_bytes())?;
    w.write_all(&(state.step as u64).to_le_bytes())?;
    Ok(())
}

/// Reads and validates a restart record.
///
/// # Errors
///
/// Returns [`Error::RestartFormat`] on a bad magic or version, truncated
/// data, an unknown field kind, an active order above the target order, or
/// step-size histories that differ between fields. Other read failures are
/// returned as [`Error::Io`].
pub fn load(r: &mut dyn Read) -> Result<RestartState, Error> {
    let mut magic = [0u8; 4];
    read_exact(r, &mut magic)?;
    if magic != MAGIC {
        return Err(Error::restart("invalid magic bytes (expected \"BDFR\")"));
    }

    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(Error::restart(format!(
            "unsupported format version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let order = read_u32(r)? as usize;
    if !(1..=MAX_ORDER).contains(&order) {
        return Err(Error::restart(format!("invalid target order {order}")));
    }

    let field_count = read_u32(r)? as usize;
    let mut fields = Vec::with_capacity(field_count.min(8));
    for _ in 0..field_count {
        fields.push(read_field(r, order)?);
    }

    if let Some((first, rest)) = fields.split_first() {
        if let Some(other) = rest.iter().find(|f| f.dts != first.dts) {
            return Err(Error::restart(format!(
                "step sizes of {:?} differ from those of {:?}",
                other.kind, first.kind
            )));
        }
    } else {
        return Err(Error::restart("record holds no fields"));
    }

    let time = read_f64(r)?;
    let step = usize::try_from(read_u64(r)?)
        .map_err(|_| Error::restart("step number does not fit this platform"))?;

    Ok(RestartState {
        order,
        fields,
        time,
        step,
    })
}

fn read_field(r: &mut dyn Read, order: usize) -> Result<FieldRecord, Error> {
    let kind = field_kind(read_u8(r)?)?;

    let active = read_u32(r)? as usize;
    if active == 0 || active > order {
        return Err(Error::restart(format!(
            "{kind:?} active order {active} outside 1..={order}"
        )));
    }

    let dts = (0..active)
        .map(|_| read_f64(r))
        .collect::<Result<Vec<_>, _>>()?;

    let mut snapshots = Vec::with_capacity(active);
    for _ in 0..active {
        let len = usize::try_from(read_u64(r)?)
            .map_err(|_| Error::restart("snapshot length does not fit this platform"))?;
        // Grow as values arrive so a corrupt length cannot force a huge allocation.
        let mut values = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            values.push(read_f64(r)?);
        }
        snapshots.push(values);
    }

    Ok(FieldRecord {
        kind,
        dts,
        snapshots,
    })
}

fn kind_tag(kind: FieldKind) -> u8 {
    match kind {
        FieldKind::Velocity => 0,
        FieldKind::Pressure => 1,
        FieldKind::Solution => 2,
    }
}

fn field_kind(tag: u8) -> Result<FieldKind, Error> {
    match tag {
        0 => Ok(FieldKind::Velocity),
        1 => Ok(FieldKind::Pressure),
        2 => Ok(FieldKind::Solution),
        _ => Err(Error::restart(format!("unknown field kind tag {tag}"))),
    }
}

fn write_u32(w: &mut dyn Write, v: usize) -> Result<(), Error> {
    let v = u32::try_from(v).map_err(|_| Error::restart(format!("count {v} exceeds u32")))?;
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_exact(r: &mut dyn Read, buf: &mut [u8]) -> Result<(), Error> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::restart("truncated record"),
        _ => Error::Io(e),
    })
}

fn read_u8(r: &mut dyn Read) -> Result<u8, Error> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

fn read_u32(r: &mut dyn Read) -> Result<u32, Error> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut dyn Read) -> Result<u64, Error> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(r: &mut dyn Read) -> Result<f64, Error> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(f64::from_le_bytes(buf))
}
