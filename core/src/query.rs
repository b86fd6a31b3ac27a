//! Predicate queries over entities of one type. Candidates come from the
//! type index; each predicate reads one field and compares it in the field
//! type's natural ordering. A failed read, a type mismatch or an
//! undecodable cell makes the predicate false, never an error.

use std::cmp::Ordering;

use strata_proto::{Entity, EntityId, Value, ValueType};

use crate::store::{EntityStore, FieldRequest};

#[derive(Debug, Clone)]
pub enum Condition {
    IsEqualTo(Value),
    IsNotEqualTo(Value),
    IsGreaterThan(Value),
    IsLessThan(Value),
    IsGreaterThanOrEqualTo(Value),
    IsLessThanOrEqualTo(Value),
    IsBetween(Value, Value),
    IsIn(Vec<Value>),
    IsNotIn(Vec<Value>),
}

impl Condition {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::IsEqualTo(rhs) => value.compare(rhs) == Some(Ordering::Equal),
            Condition::IsNotEqualTo(rhs) => matches!(value.compare(rhs), Some(ordering) if ordering != Ordering::Equal),
            Condition::IsGreaterThan(rhs) => value.compare(rhs) == Some(Ordering::Greater),
            Condition::IsLessThan(rhs) => value.compare(rhs) == Some(Ordering::Less),
            Condition::IsGreaterThanOrEqualTo(rhs) => matches!(value.compare(rhs), Some(Ordering::Greater | Ordering::Equal)),
            Condition::IsLessThanOrEqualTo(rhs) => matches!(value.compare(rhs), Some(Ordering::Less | Ordering::Equal)),
            Condition::IsBetween(lower, upper) => {
                matches!(value.compare(lower), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(value.compare(upper), Some(Ordering::Less | Ordering::Equal))
            }
            Condition::IsIn(values) => values.iter().any(|rhs| value.compare(rhs) == Some(Ordering::Equal)),
            Condition::IsNotIn(values) => {
                // The field must be of the list's type for exclusion to mean anything.
                match values.first() {
                    Some(first) if ValueType::of(first) != ValueType::of(value) => false,
                    _ => !values.iter().any(|rhs| value.compare(rhs) == Some(Ordering::Equal)),
                }
            }
        }
    }
}

/// One field comparison of a search.
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    pub field: String,
    pub condition: Condition,
}

impl FieldPredicate {
    pub(crate) async fn evaluate(&self, store: &EntityStore, entity_id: &EntityId) -> bool {
        let mut request = FieldRequest::new(*entity_id, self.field.as_str());
        store.read(std::slice::from_mut(&mut request)).await;
        if !request.success {
            return false;
        }
        match &request.value {
            Some(value) => self.condition.matches(value),
            None => false,
        }
    }
}

/// Fluent predicate construction: `Where::field("count").is_greater_than(Value::Int(1))`.
#[derive(Debug, Clone)]
pub struct Where {
    field: String,
}

impl Where {
    pub fn field(name: impl Into<String>) -> Self { Self { field: name.into() } }

    pub fn is_equal_to(self, rhs: Value) -> FieldPredicate { self.build(Condition::IsEqualTo(rhs)) }

    pub fn is_not_equal_to(self, rhs: Value) -> FieldPredicate { self.build(Condition::IsNotEqualTo(rhs)) }

    pub fn is_greater_than(self, rhs: Value) -> FieldPredicate { self.build(Condition::IsGreaterThan(rhs)) }

    pub fn is_less_than(self, rhs: Value) -> FieldPredicate { self.build(Condition::IsLessThan(rhs)) }

    pub fn is_greater_than_or_equal_to(self, rhs: Value) -> FieldPredicate { self.build(Condition::IsGreaterThanOrEqualTo(rhs)) }

    pub fn is_less_than_or_equal_to(self, rhs: Value) -> FieldPredicate { self.build(Condition::IsLessThanOrEqualTo(rhs)) }

    pub fn is_between(self, lower: Value, upper: Value) -> FieldPredicate { self.build(Condition::IsBetween(lower, upper)) }

    pub fn is_in(self, values: Vec<Value>) -> FieldPredicate { self.build(Condition::IsIn(values)) }

    pub fn is_not_in(self, values: Vec<Value>) -> FieldPredicate { self.build(Condition::IsNotIn(values)) }

    fn build(self, condition: Condition) -> FieldPredicate { FieldPredicate { field: self.field, condition } }
}

pub struct SearchCriteria {
    pub entity_type: String,
    pub predicates: Vec<FieldPredicate>,
}

impl SearchCriteria {
    pub fn new(entity_type: impl Into<String>, predicates: Vec<FieldPredicate>) -> Self {
        Self { entity_type: entity_type.into(), predicates }
    }
}

pub struct EntityFinder<'a> {
    store: &'a EntityStore,
}

impl<'a> EntityFinder<'a> {
    pub fn new(store: &'a EntityStore) -> Self { Self { store } }

    /// Entities of the criteria's type passing every predicate, with
    /// short-circuit AND evaluation.
    pub async fn find(&self, criteria: &SearchCriteria) -> Vec<Entity> {
        let mut results = Vec::new();

        'candidates: for entity_id in self.store.find_entities(&criteria.entity_type).await {
            for predicate in &criteria.predicates {
                if !predicate.evaluate(self.store, &entity_id).await {
                    continue 'candidates;
                }
            }
            if let Some(entity) = self.store.get_entity(&entity_id).await {
                results.push(entity);
            }
        }

        results
    }
}
