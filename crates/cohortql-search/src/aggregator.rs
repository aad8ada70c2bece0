//! Boolean group structure.
//!
//! Items of a group must all hold, include groups are alternatives, and
//! anyone in any exclude group is removed from the result.

use cohortql_core::{PersonSet, SearchGroup, SearchGroupItem, SearchRequest};

use crate::error::{Result, ValidationError};
use crate::family::CriterionFamily;

/// Plan for the whole request. Expects a validated request.
pub fn build_request_set(request: &SearchRequest) -> Result<PersonSet> {
    let included = union_of(&request.includes)?;
    let excluded = union_of(&request.excludes)?;
    Ok(PersonSet::except(included, excluded))
}

fn union_of(groups: &[SearchGroup]) -> Result<PersonSet> {
    let sets = groups.iter().map(build_group).collect::<Result<Vec<_>>>()?;
    Ok(PersonSet::union(sets))
}

pub fn build_group(group: &SearchGroup) -> Result<PersonSet> {
    let sets = group.items.iter().map(build_item).collect::<Result<Vec<_>>>()?;
    Ok(PersonSet::intersect(sets))
}

pub fn build_item(item: &SearchGroupItem) -> Result<PersonSet> {
    let family = CriterionFamily::from_item_type(&item.item_type).ok_or_else(|| {
        ValidationError::new(
            "item_type_invalid",
            format!("Item type \"{}\" is not valid.", item.item_type),
        )
        .with_item(item.id.clone())
    })?;
    family.build(item)
}
