//! Change detection between two declared configurations
//!
//! Some attributes only matter under certain values of others. Those
//! attributes are suppressed from change detection when they do not apply,
//! so that editing them has no remote effect.

use crate::model::{InstanceConfig, InstanceTier, RenewalStatus};
use std::collections::BTreeSet;
use std::fmt;

/// Declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    InstanceType,
    MaxTps,
    MaxEipTps,
    QueueCapacity,
    SupportEip,
    StorageSize,
    PaymentType,
    Period,
    RenewalDuration,
    RenewalDurationUnit,
    RenewalStatus,
    ModifyType,
    Logistics,
}

impl Field {
    /// Attributes applied by the renewal request
    pub const RENEWAL: &'static [Field] = &[
        Field::RenewalStatus,
        Field::PaymentType,
        Field::RenewalDuration,
        Field::RenewalDurationUnit,
    ];

    /// Attributes applied by the capacity modification request
    pub const CAPACITY: &'static [Field] = &[
        Field::MaxEipTps,
        Field::MaxTps,
        Field::PaymentType,
        Field::QueueCapacity,
        Field::SupportEip,
        Field::ModifyType,
    ];

    /// Attribute name in the declarative schema
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::InstanceType => "instance_type",
            Field::MaxTps => "max_tps",
            Field::MaxEipTps => "max_eip_tps",
            Field::QueueCapacity => "queue_capacity",
            Field::SupportEip => "support_eip",
            Field::StorageSize => "storage_size",
            Field::PaymentType => "payment_type",
            Field::Period => "period",
            Field::RenewalDuration => "renewal_duration",
            Field::RenewalDurationUnit => "renewal_duration_unit",
            Field::RenewalStatus => "renewal_status",
            Field::ModifyType => "modify_type",
            Field::Logistics => "logistics",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `field` is ignored for change detection under `config`
///
/// Subscription is the only declarable payment type, so the period and
/// renewal attributes always apply; a second payment type would need its
/// own rules here.
pub fn is_suppressed(field: Field, config: &InstanceConfig) -> bool {
    match field {
        Field::MaxEipTps => !config.support_eip,
        Field::StorageSize => config.instance_type == InstanceTier::Professional,
        Field::RenewalDuration | Field::RenewalDurationUnit => {
            config.renewal_status != Some(RenewalStatus::AutoRenewal)
        }
        _ => false,
    }
}

/// Set of declared attributes that differ, after suppression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: BTreeSet<Field>,
    new_resource: bool,
}

impl ChangeSet {
    /// An empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Change set for the first reconciliation after create
    pub fn new_resource() -> Self {
        Self {
            fields: BTreeSet::new(),
            new_resource: true,
        }
    }

    /// Compare two declared configurations
    ///
    /// Suppression rules are evaluated against `planned`.
    pub fn between(prior: &InstanceConfig, planned: &InstanceConfig) -> Self {
        let mut fields = BTreeSet::new();

        let mut note = |field: Field, differs: bool| {
            if differs && !is_suppressed(field, planned) {
                fields.insert(field);
            }
        };

        note(Field::InstanceType, prior.instance_type != planned.instance_type);
        note(Field::MaxTps, prior.max_tps != planned.max_tps);
        note(Field::MaxEipTps, prior.eip_throughput() != planned.eip_throughput());
        note(Field::QueueCapacity, prior.queue_capacity != planned.queue_capacity);
        note(Field::SupportEip, prior.support_eip != planned.support_eip);
        note(Field::StorageSize, prior.storage() != planned.storage());
        note(Field::PaymentType, prior.payment_type != planned.payment_type);
        note(Field::Period, prior.period != planned.period);
        note(Field::RenewalDuration, prior.renewal_duration != planned.renewal_duration);
        note(
            Field::RenewalDurationUnit,
            prior.renewal_duration_unit != planned.renewal_duration_unit,
        );
        note(Field::RenewalStatus, prior.renewal_status != planned.renewal_status);
        note(Field::ModifyType, prior.modify_type != planned.modify_type);
        note(Field::Logistics, prior.logistics_info() != planned.logistics_info());

        Self {
            fields,
            new_resource: false,
        }
    }

    /// Mark a field as changed
    pub fn with(mut self, field: Field) -> Self {
        self.fields.insert(field);
        self
    }

    /// Whether `field` changed
    pub fn has(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Whether any of `fields` changed
    pub fn has_any(&self, fields: &[Field]) -> bool {
        fields.iter().any(|f| self.has(*f))
    }

    /// Whether this is the first reconciliation after create
    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.new_resource
    }

    /// Changed fields in schema order
    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.iter().copied()
    }
}
