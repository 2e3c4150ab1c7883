//! The resolution engine
//!
//! One depth-first traversal per root record: every reachable record is
//! registered into the suite exactly once, foreign-key fields are inferred and
//! filled from the records they reference, and every inter-schema reference is
//! recorded as a dependency edge. Registration doubles as the cycle guard:
//! a record that is already in its collection is never re-traversed.

use tracing::debug;

use crate::error::{Result, SeedError};
use crate::field::{BelongsTo, Field, FieldInit, HasMany, ManyToMany};
use crate::record::{Identity, Record};
use crate::suite::Suite;
use crate::value::Value;

/// Resolve a record graph into a fresh suite.
pub fn resolve(root: &Record) -> Result<Suite> {
    let mut suite = Suite::new();
    Walker::new(&mut suite).visit(root)?;
    Ok(suite)
}

/// Walks a record graph, populating the target suite.
pub struct Walker<'a> {
    suite: &'a mut Suite,
}

impl<'a> Walker<'a> {
    pub fn new(suite: &'a mut Suite) -> Self {
        Walker { suite }
    }

    /// Register a record and resolve its relationship fields. Idempotent: a
    /// record that is already registered is returned without re-traversal.
    pub fn visit(&mut self, record: &Record) -> Result<()> {
        let schema = record.schema();
        if !self.suite.collection_for(&schema).add(record) {
            return Ok(());
        }
        debug!(schema = %schema, record = %record, "visiting");
        for (name, field) in record.fields() {
            self.dispatch(record, &name, field)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, record: &Record, name: &str, field: Field) -> Result<()> {
        match field {
            Field::Literal(_) => Ok(()),
            Field::HasMany(children) => self.handle_children(record, name, &children),
            Field::ManyToMany(links) => self.handle_links(record, name, &links),
            Field::BelongsTo(reference) => self.handle_reference(record, name, &reference),
            Field::Computed(computed) => {
                // a computed field may produce a relationship declaration;
                // plain values need no resolution
                match computed.evaluate(record, name) {
                    FieldInit::Declared(field) => self.dispatch(record, name, field),
                    _ => Ok(()),
                }
            }
        }
    }

    /// One-to-many: register each child, fill its foreign-key fields from the
    /// parent, and record that the child's schema depends on the parent's.
    fn handle_children(&mut self, parent: &Record, name: &str, children: &HasMany) -> Result<()> {
        let parent_schema = parent.schema();
        let parent_identity = parent.identity_field_names();

        for child in children.records() {
            self.suite.add_dependency(&child.schema(), &parent_schema);
            let mapping = self.child_key_mapping(parent, name, children, child, &parent_identity)?;
            for (child_field, parent_field) in mapping {
                child.set_value(&child_field, parent.value(&parent_field)?);
            }
            self.visit(child)?;
        }
        Ok(())
    }

    /// Resolve which child fields receive which parent fields.
    ///
    /// With explicit referring fields the counts are validated against the
    /// explicit referred fields or the parent's identity; a child field that
    /// itself declares a reference must agree with the collection. Without
    /// referring fields the child must carry exactly one reference declared
    /// toward the parent's schema, and that reference's own mapping is used.
    fn child_key_mapping(
        &self,
        parent: &Record,
        name: &str,
        children: &HasMany,
        child: &Record,
        parent_identity: &[String],
    ) -> Result<Vec<(String, String)>> {
        let parent_schema = parent.schema();
        let referred = children.referred_field_names();

        if let Some(referring) = children.referring_field_names() {
            if let Some(referred) = referred {
                if referring.len() != referred.len() {
                    return Err(SeedError::ReferringCountMismatch {
                        schema: parent_schema,
                        field: name.to_string(),
                        referring: referring.len(),
                        referred: referred.len(),
                    });
                }
            } else if referring.len() != parent_identity.len() {
                return Err(SeedError::IdentityCountMismatch {
                    schema: parent_schema,
                    field: name.to_string(),
                    referring: referring.len(),
                    identity: parent_identity.len(),
                });
            }

            let mut mapping = Vec::with_capacity(referring.len());
            for (i, child_field) in referring.iter().enumerate() {
                let fallback = match referred {
                    Some(referred) => referred[i].clone(),
                    None => parent_identity[i].clone(),
                };
                let parent_field = match child.field(child_field) {
                    Some(Field::BelongsTo(reference)) => {
                        if let Some(declared) = reference.schema_name() {
                            if declared != parent_schema {
                                return Err(SeedError::ConflictingSchema {
                                    record: child.to_string(),
                                    field: child_field.clone(),
                                    declared: declared.to_string(),
                                    actual: parent_schema,
                                });
                            }
                        }
                        match reference.target_field_names().and_then(|t| t.get(i)) {
                            Some(declared) => {
                                if let Some(referred) = referred {
                                    if declared != &referred[i] {
                                        return Err(SeedError::ConflictingTarget {
                                            record: child.to_string(),
                                            field: child_field.clone(),
                                            actual: parent_schema,
                                            declared: declared.clone(),
                                            expected: referred[i].clone(),
                                        });
                                    }
                                }
                                declared.clone()
                            }
                            None => fallback,
                        }
                    }
                    _ => fallback,
                };
                mapping.push((child_field.clone(), parent_field));
            }
            return Ok(mapping);
        }

        // no explicit mapping: infer from the child's unique reference to us
        let mut inferred: Option<BelongsTo> = None;
        for (_, field) in child.fields() {
            if let Field::BelongsTo(reference) = field {
                if reference.schema_name() == Some(parent_schema.as_str()) {
                    if inferred.is_some() {
                        return Err(SeedError::AmbiguousReference {
                            record: child.to_string(),
                            schema: parent_schema,
                        });
                    }
                    inferred = Some(reference);
                }
            }
        }
        let reference = inferred.ok_or_else(|| SeedError::MissingReference {
            record: child.to_string(),
            schema: parent_schema.clone(),
        })?;
        let locals = reference
            .local_field_names()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let targets = reference
            .target_field_names()
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| parent_identity.to_vec());
        Ok(locals.into_iter().zip(targets).collect())
    }

    /// Many-to-many: register each related record, validate the column lists
    /// against both identity arities, and materialize one join record per
    /// pair when a join schema is declared.
    fn handle_links(&mut self, record: &Record, name: &str, links: &ManyToMany) -> Result<()> {
        let schema = record.schema();
        let this_side = links.this_side_field_names();
        let other_side = links.other_side_field_names();

        for other in links.records() {
            self.suite.add_dependency(&other.schema(), &schema);
            if let Some(via) = links.via_schema() {
                // the join schema is the one carrying foreign keys to both sides
                self.suite.add_dependency(via, &schema);
                self.suite.add_dependency(via, &other.schema());
            }
            self.visit(other)?;

            let these = record.identity_values()?;
            let those = other.identity_values()?;
            if these.len() != this_side.len() {
                return Err(SeedError::ThisSideCountMismatch {
                    schema: schema.clone(),
                    field: name.to_string(),
                    fields: this_side.len(),
                    identity: these.len(),
                });
            }
            if those.len() != other_side.len() {
                return Err(SeedError::OtherSideCountMismatch {
                    schema: schema.clone(),
                    field: name.to_string(),
                    fields: other_side.len(),
                    identity: those.len(),
                });
            }

            if let Some(via) = links.via_schema() {
                let join_identity: Vec<String> = this_side
                    .iter()
                    .chain(other_side.iter())
                    .cloned()
                    .collect();
                let join = Record::new(via, Identity::Fields(join_identity));
                for (field, value) in this_side.iter().zip(these) {
                    join.set_value(field, value);
                }
                for (field, value) in other_side.iter().zip(those) {
                    join.set_value(field, value);
                }
                self.visit(&join)?;
            }
        }
        Ok(())
    }

    /// Many-to-one: record the dependency, register the target, and copy its
    /// resolved target fields into the local foreign-key fields, unless the
    /// reference self-bound to its own field, in which case the field keeps
    /// the live reference and renders late. An absent target fills NULL.
    fn handle_reference(
        &mut self,
        record: &Record,
        name: &str,
        reference: &BelongsTo,
    ) -> Result<()> {
        let schema = record.schema();
        if let Some(target_schema) = reference.schema_name() {
            self.suite.add_dependency(&schema, target_schema);
        }
        let target = reference.target().cloned();
        if let Some(target) = &target {
            self.visit(target)?;
        }

        let Some(locals) = reference.local_field_names() else {
            return Ok(());
        };
        if reference.is_auto_rendered() {
            return Ok(());
        }
        match &target {
            Some(target) => {
                let targets = reference
                    .target_field_names()
                    .map(<[String]>::to_vec)
                    .unwrap_or_else(|| target.identity_field_names());
                if targets.is_empty() {
                    return Err(SeedError::UnresolvedTargetFields {
                        schema,
                        field: name.to_string(),
                    });
                }
                if locals.len() != targets.len() {
                    return Err(SeedError::TargetCountMismatch {
                        schema,
                        field: name.to_string(),
                        local: locals.len(),
                        target: targets.len(),
                    });
                }
                for (local, target_field) in locals.iter().zip(&targets) {
                    record.set_value(local, target.value(target_field)?);
                }
            }
            None => {
                // a local field a parent already filled stays filled
                for local in locals {
                    if !matches!(record.field(local), Some(Field::Literal(_))) {
                        record.set_value(local, Value::Null);
                    }
                }
            }
        }
        Ok(())
    }
}
