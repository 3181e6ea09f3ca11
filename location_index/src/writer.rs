//! Serializes the region tree into `location.idx`. Two passes over the tree
//! plus a trailing address section; header records reserve their data
//! offsets, the data pass patches them in, and sibling-skip offsets let a
//! reader jump over subtrees it doesn't care about.

use std::collections::VecDeque;

use anyhow::Result;
use map_data::{
    ImportParameter, ObjectFileRefStreamWriter, RefType, AREAS_DAT, LOCATION_IDX, NODES_DAT,
    WAYS_DAT,
};
use osmio::{bytes_needed_to_address, FileOffset, FileWriter, OffsetPatch};

use crate::region::Region;

pub(crate) struct OffsetWidths {
    pub node: u8,
    pub area: u8,
    pub way: u8,
}

impl OffsetWidths {
    pub fn for_type(&self, typ: RefType) -> u8 {
        match typ {
            RefType::Node => self.node,
            RefType::Area => self.area,
            RefType::Way => self.way,
        }
    }
}

pub fn write_location_index(
    parameter: &ImportParameter,
    root: &mut Region,
    region_ignore_tokens: &[String],
    location_ignore_tokens: &[String],
) -> Result<()> {
    let widths = OffsetWidths {
        node: bytes_needed_to_address(&parameter.file(NODES_DAT))?,
        area: bytes_needed_to_address(&parameter.file(AREAS_DAT))?,
        way: bytes_needed_to_address(&parameter.file(WAYS_DAT))?,
    };

    let path = parameter.file(LOCATION_IDX);
    let mut writer = FileWriter::create(&path)?;

    match write_all(
        &mut writer,
        &widths,
        root,
        region_ignore_tokens,
        location_ignore_tokens,
    ) {
        Ok(()) => {
            writer.close()?;
            Ok(())
        }
        Err(err) => {
            writer.close_failsafe();
            Err(err)
        }
    }
}

fn write_all(
    writer: &mut FileWriter,
    widths: &OffsetWidths,
    root: &mut Region,
    region_ignore_tokens: &[String],
    location_ignore_tokens: &[String],
) -> Result<()> {
    writer.write_u8(widths.node)?;
    writer.write_u8(widths.area)?;
    writer.write_u8(widths.way)?;

    for tokens in [region_ignore_tokens, location_ignore_tokens] {
        writer.write_varint_u64(tokens.len() as u64)?;
        for token in tokens {
            writer.write_string(token)?;
        }
    }

    // Index pass: every region reserves the offset of its data record. The
    // reservations come back in depth-first pre-order, exactly the order the
    // data pass visits.
    let mut data_patches = VecDeque::new();
    writer.write_varint_u64(root.regions.len() as u64)?;
    for child in &mut root.regions {
        let next_sibling = writer.reserve_file_offset()?;
        write_region_index_entry(writer, widths, 0, child, &mut data_patches)?;
        let after = writer.pos();
        writer.patch_file_offset(next_sibling, after)?;
    }

    // Data pass; address sections are reserved here and written last.
    let mut address_patches = VecDeque::new();
    for child in &mut root.regions {
        write_region_data_entry(writer, child, &mut data_patches, &mut address_patches)?;
    }
    assert!(
        data_patches.is_empty(),
        "index and data passes visited different region sets"
    );

    for child in &mut root.regions {
        write_region_addresses(writer, child, &mut address_patches)?;
    }
    assert!(
        address_patches.is_empty(),
        "data and address passes visited different location sets"
    );

    Ok(())
}

fn write_region_index_entry(
    writer: &mut FileWriter,
    widths: &OffsetWidths,
    parent_index_offset: FileOffset,
    region: &mut Region,
    data_patches: &mut VecDeque<OffsetPatch>,
) -> Result<()> {
    region.index_offset = writer.pos();

    data_patches.push_back(writer.reserve_file_offset()?);
    writer.write_u64(parent_index_offset)?;

    writer.write_string(&region.name)?;
    writer.write_u8(region.reference.typ as u8)?;
    writer.write_file_offset(region.reference.offset, widths.for_type(region.reference.typ))?;

    writer.write_varint_u64(region.aliases.len() as u64)?;
    for alias in &region.aliases {
        writer.write_string(&alias.name)?;
        writer.write_file_offset(alias.node_offset, widths.node)?;
    }

    writer.write_varint_u64(region.regions.len() as u64)?;
    for child in &mut region.regions {
        let next_sibling = writer.reserve_file_offset()?;
        write_region_index_entry(writer, widths, region.index_offset, child, data_patches)?;
        let after = writer.pos();
        writer.patch_file_offset(next_sibling, after)?;
    }

    Ok(())
}

fn write_region_data_entry(
    writer: &mut FileWriter,
    region: &mut Region,
    data_patches: &mut VecDeque<OffsetPatch>,
    address_patches: &mut VecDeque<OffsetPatch>,
) -> Result<()> {
    region.data_offset = writer.pos();
    writer.patch_file_offset(data_patches.pop_front().unwrap(), region.data_offset)?;

    region
        .pois
        .sort_by(|a, b| a.name.cmp(&b.name).then(a.object.cmp(&b.object)));

    writer.write_varint_u64(region.pois.len() as u64)?;
    let mut refs = ObjectFileRefStreamWriter::new();
    for poi in &region.pois {
        writer.write_string(&poi.name)?;
        refs.write(writer, poi.object)?;
    }

    writer.write_varint_u64(region.locations.len() as u64)?;
    for location in region.locations.values_mut() {
        location.objects.sort();
    }
    for (name, location) in &region.locations {
        writer.write_string(name)?;
        writer.write_varint_u64(location.objects.len() as u64)?;

        if location.addresses.is_empty() {
            writer.write_bool(false)?;
        } else {
            writer.write_bool(true)?;
            address_patches.push_back(writer.reserve_file_offset()?);
        }

        refs.reset();
        for object in &location.objects {
            refs.write(writer, *object)?;
        }
    }

    for child in &mut region.regions {
        write_region_data_entry(writer, child, data_patches, address_patches)?;
    }

    Ok(())
}

fn write_region_addresses(
    writer: &mut FileWriter,
    region: &mut Region,
    address_patches: &mut VecDeque<OffsetPatch>,
) -> Result<()> {
    for location in region.locations.values_mut() {
        if location.addresses.is_empty() {
            continue;
        }

        let offset = writer.pos();
        writer.patch_file_offset(address_patches.pop_front().unwrap(), offset)?;

        location
            .addresses
            .sort_by(|a, b| a.house_number.cmp(&b.house_number));

        writer.write_varint_u64(location.addresses.len() as u64)?;
        let mut refs = ObjectFileRefStreamWriter::new();
        for address in &location.addresses {
            writer.write_string(&address.house_number)?;
            refs.write(writer, address.object)?;
        }
    }

    for child in &mut region.regions {
        write_region_addresses(writer, child, address_patches)?;
    }

    Ok(())
}
