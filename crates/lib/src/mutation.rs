//! Pure snapshot transforms.
//!
//! Every operation borrows the current [`Snapshot`] and returns the next one.
//! Collections an operation does not touch are shared with its input, and an
//! operation targeting an unknown identifier returns its input unchanged.

use std::sync::Arc;

use chrono::Utc;

use crate::error::require;
use crate::{
    Bolo, BoloId, Call, CallId, CallOrigin, Group, GroupId, Priority, Snapshot, Subdivision, Unit,
    UnitId, UnitIdSet, UnitStatus, UnitType, ValidationError,
};

#[derive(Debug, Clone)]
pub struct NewUnit {
    pub name: String,
    pub kind: UnitType,
    pub subdivision: Option<Subdivision>,
    pub status: UnitStatus,
}

impl NewUnit {
    pub fn new(name: impl Into<String>, kind: UnitType) -> Self {
        NewUnit {
            name: name.into(),
            kind,
            subdivision: None,
            status: UnitStatus::Available,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCall {
    pub title: String,
    pub address: String,
    pub postal: String,
    pub priority: Priority,
    pub origin: CallOrigin,
    pub code: String,
    pub active: bool,
}

impl NewCall {
    pub fn new(title: impl Into<String>) -> Self {
        NewCall {
            title: title.into(),
            active: true,
            ..Default::default()
        }
    }
}

/// Fields of a call to overwrite; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct CallPatch {
    pub title: Option<String>,
    pub address: Option<String>,
    pub postal: Option<String>,
    pub priority: Option<Priority>,
    pub origin: Option<CallOrigin>,
    pub code: Option<String>,
    pub active: Option<bool>,
    pub notes: Option<String>,
}

impl CallPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.address.is_none()
            && self.postal.is_none()
            && self.priority.is_none()
            && self.origin.is_none()
            && self.code.is_none()
            && self.active.is_none()
            && self.notes.is_none()
    }

    fn apply(self, call: &mut Call) {
        if let Some(title) = self.title {
            call.title = title;
        }
        if let Some(address) = self.address {
            call.address = address;
        }
        if let Some(postal) = self.postal {
            call.postal = postal;
        }
        if let Some(priority) = self.priority {
            call.priority = priority;
        }
        if let Some(origin) = self.origin {
            call.origin = origin;
        }
        if let Some(code) = self.code {
            call.code = code;
        }
        if let Some(active) = self.active {
            call.active = active;
        }
        if let Some(notes) = self.notes {
            call.notes = notes;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewBolo {
    pub title: String,
    pub plate: String,
    pub note: String,
    pub active: bool,
}

/// Rebuilds `items` with `f` applied to the entry matching `pred`.
///
/// Returns `None` when nothing matched so callers can keep sharing the
/// original collection.
fn update_where<T: Clone>(
    items: &Arc<Vec<T>>,
    pred: impl Fn(&T) -> bool,
    f: impl FnOnce(&mut T),
) -> Option<Arc<Vec<T>>> {
    let pos = items.iter().position(pred)?;
    let mut next = items.as_ref().clone();
    f(&mut next[pos]);
    Some(Arc::new(next))
}

fn remove_where<T: Clone>(items: &Arc<Vec<T>>, pred: impl Fn(&T) -> bool) -> Option<Arc<Vec<T>>> {
    if !items.iter().any(&pred) {
        return None;
    }
    Some(Arc::new(
        items.iter().filter(|item| !pred(*item)).cloned().collect(),
    ))
}

fn with_call(snapshot: &Snapshot, id: &CallId, f: impl FnOnce(&mut Call)) -> Snapshot {
    match update_where(&snapshot.calls, |call| &call.id == id, f) {
        Some(calls) => Snapshot {
            calls,
            ..snapshot.clone()
        },
        None => snapshot.clone(),
    }
}

pub fn create_unit(snapshot: &Snapshot, new: NewUnit) -> Result<(Snapshot, UnitId), ValidationError> {
    require("unit name", &new.name)?;

    let id = UnitId::generate();
    let unit = Unit {
        id: id.clone(),
        name: new.name.trim().to_string(),
        kind: new.kind,
        subdivision: new.subdivision.filter(|_| new.kind.has_subdivisions()),
        status: new.status,
    };

    let mut units = snapshot.units.as_ref().clone();
    units.push(unit);
    Ok((
        Snapshot {
            units: Arc::new(units),
            ..snapshot.clone()
        },
        id,
    ))
}

/// Removes a unit along with every group membership and call assignment
/// that refers to it.
pub fn delete_unit(snapshot: &Snapshot, id: &UnitId) -> Snapshot {
    let units = remove_where(&snapshot.units, |unit| &unit.id == id);

    let groups = if snapshot.groups.iter().any(|g| g.unit_ids.contains(id)) {
        Arc::new(
            snapshot
                .groups
                .iter()
                .map(|group| {
                    let mut group = group.clone();
                    group.unit_ids.remove(id);
                    group
                })
                .collect(),
        )
    } else {
        snapshot.groups.clone()
    };

    let calls = if snapshot.calls.iter().any(|c| c.assigned.contains(id)) {
        Arc::new(
            snapshot
                .calls
                .iter()
                .map(|call| {
                    let mut call = call.clone();
                    call.assigned.remove(id);
                    call
                })
                .collect(),
        )
    } else {
        snapshot.calls.clone()
    };

    Snapshot {
        units: units.unwrap_or_else(|| snapshot.units.clone()),
        groups,
        calls,
        ..snapshot.clone()
    }
}

pub fn set_unit_status(snapshot: &Snapshot, id: &UnitId, status: UnitStatus) -> Snapshot {
    match update_where(&snapshot.units, |unit| &unit.id == id, |unit| unit.status = status) {
        Some(units) => Snapshot {
            units,
            ..snapshot.clone()
        },
        None => snapshot.clone(),
    }
}

/// Member identifiers are kept as given, whether or not they resolve.
pub fn create_group(
    snapshot: &Snapshot,
    name: &str,
    members: impl IntoIterator<Item = UnitId>,
) -> Result<(Snapshot, GroupId), ValidationError> {
    require("group name", name)?;

    let id = GroupId::generate();
    let mut groups = snapshot.groups.as_ref().clone();
    groups.push(Group {
        id: id.clone(),
        name: name.trim().to_string(),
        unit_ids: members.into_iter().collect(),
    });
    Ok((
        Snapshot {
            groups: Arc::new(groups),
            ..snapshot.clone()
        },
        id,
    ))
}

/// Calls keep whatever assignments they received through the group.
pub fn delete_group(snapshot: &Snapshot, id: &GroupId) -> Snapshot {
    match remove_where(&snapshot.groups, |group| &group.id == id) {
        Some(groups) => Snapshot {
            groups,
            ..snapshot.clone()
        },
        None => snapshot.clone(),
    }
}

pub fn create_call(snapshot: &Snapshot, new: NewCall) -> Result<(Snapshot, CallId), ValidationError> {
    require("call title", &new.title)?;

    let id = CallId::generate();
    let call = Call {
        id: id.clone(),
        title: new.title.trim().to_string(),
        address: new.address,
        postal: new.postal,
        priority: new.priority,
        origin: new.origin,
        code: new.code,
        active: new.active,
        notes: String::new(),
        assigned: UnitIdSet::new(),
    };

    let mut calls = Vec::with_capacity(snapshot.calls.len() + 1);
    calls.push(call);
    calls.extend(snapshot.calls.iter().cloned());
    Ok((
        Snapshot {
            calls: Arc::new(calls),
            ..snapshot.clone()
        },
        id,
    ))
}

pub fn delete_call(snapshot: &Snapshot, id: &CallId) -> Snapshot {
    match remove_where(&snapshot.calls, |call| &call.id == id) {
        Some(calls) => Snapshot {
            calls,
            ..snapshot.clone()
        },
        None => snapshot.clone(),
    }
}

pub fn toggle_call_active(snapshot: &Snapshot, id: &CallId) -> Snapshot {
    with_call(snapshot, id, |call| call.active = !call.active)
}

pub fn edit_call(snapshot: &Snapshot, id: &CallId, patch: CallPatch) -> Snapshot {
    if patch.is_empty() {
        return snapshot.clone();
    }
    with_call(snapshot, id, |call| patch.apply(call))
}

/// The unit identifier is not checked against the unit collection.
pub fn assign_unit_to_call(snapshot: &Snapshot, unit_id: &UnitId, call_id: &CallId) -> Snapshot {
    match snapshot.call(call_id) {
        Some(call) if !call.assigned.contains(unit_id) => with_call(snapshot, call_id, |call| {
            call.assigned.insert(unit_id.clone());
        }),
        _ => snapshot.clone(),
    }
}

/// Copies the group's current members into the call's assignments. Later
/// changes to the group do not propagate.
pub fn assign_group_to_call(snapshot: &Snapshot, group_id: &GroupId, call_id: &CallId) -> Snapshot {
    let Some(group) = snapshot.group(group_id) else {
        return snapshot.clone();
    };
    let members = group.unit_ids.clone();
    with_call(snapshot, call_id, |call| {
        call.assigned.union_with(&members);
    })
}

pub fn remove_assigned_unit(snapshot: &Snapshot, unit_id: &UnitId, call_id: &CallId) -> Snapshot {
    match snapshot.call(call_id) {
        Some(call) if call.assigned.contains(unit_id) => with_call(snapshot, call_id, |call| {
            call.assigned.remove(unit_id);
        }),
        _ => snapshot.clone(),
    }
}

pub fn create_bolo(snapshot: &Snapshot, new: NewBolo) -> Result<(Snapshot, BoloId), ValidationError> {
    require("BOLO title", &new.title)?;

    let id = BoloId::generate();
    let bolo = Bolo {
        id: id.clone(),
        title: new.title.trim().to_string(),
        plate: new.plate,
        note: new.note,
        active: new.active,
        created_at: Utc::now(),
    };

    let mut bolos = Vec::with_capacity(snapshot.bolos.len() + 1);
    bolos.push(bolo);
    bolos.extend(snapshot.bolos.iter().cloned());
    Ok((
        Snapshot {
            bolos: Arc::new(bolos),
            ..snapshot.clone()
        },
        id,
    ))
}

pub fn delete_bolo(snapshot: &Snapshot, id: &BoloId) -> Snapshot {
    match remove_where(&snapshot.bolos, |bolo| &bolo.id == id) {
        Some(bolos) => Snapshot {
            bolos,
            ..snapshot.clone()
        },
        None => snapshot.clone(),
    }
}

pub fn set_dispatch_notes(snapshot: &Snapshot, notes: impl Into<String>) -> Snapshot {
    Snapshot {
        dispatch_notes: notes.into(),
        ..snapshot.clone()
    }
}
