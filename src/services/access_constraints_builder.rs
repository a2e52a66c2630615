//! 访问约束构建器
//! 按实体和操作登记查询约束、内存谓词约束与脚本约束

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SecurityError};
use crate::models::group::{
    ConstraintPredicate, EntityConstraint, InMemoryConstraint, JpqlConstraint, ScriptEvaluator,
    SetOfEntityConstraints,
};
use crate::models::metadata::Metadata;
use crate::models::permission::EntityOp;

pub struct AccessConstraintsBuilder {
    metadata: Arc<Metadata>,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
    join_sets: Vec<SetOfEntityConstraints>,
    builder_constraints: HashMap<String, Vec<EntityConstraint>>,
}

impl AccessConstraintsBuilder {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self {
            metadata,
            scripts: None,
            join_sets: Vec::new(),
            builder_constraints: HashMap::new(),
        }
    }

    pub fn with_script_evaluator(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn join(mut self, constraints: SetOfEntityConstraints) -> Self {
        self.join_sets.push(constraints);
        self
    }

    pub fn with_jpql(mut self, entity_name: &str, where_clause: &str, join_clause: Option<&str>) -> Result<Self> {
        let entity_type = self.metadata.class_nn(entity_name)?.name.clone();
        let constraint = JpqlConstraint {
            entity_type: entity_type.clone(),
            where_clause: Some(where_clause.to_string()).filter(|w| !w.is_empty()),
            join_clause: join_clause.filter(|j| !j.is_empty()).map(str::to_string),
            predicate: None,
        };
        self.add_constraint(entity_type, EntityConstraint::Jpql(constraint));
        Ok(self)
    }

    pub fn with_in_memory(
        mut self,
        entity_name: &str,
        operation: EntityOp,
        predicate: ConstraintPredicate,
    ) -> Result<Self> {
        let entity_type = self.metadata.class_nn(entity_name)?.name.clone();
        let constraint = InMemoryConstraint {
            entity_type: entity_type.clone(),
            operation,
            predicate,
        };
        self.add_constraint(entity_type, EntityConstraint::InMemory(constraint));
        Ok(self)
    }

    /// Registers a predicate that evaluates `script` through the configured
    /// [`ScriptEvaluator`].
    pub fn with_groovy(self, entity_name: &str, operation: EntityOp, script: &str) -> Result<Self> {
        let scripts = self.scripts.clone().ok_or_else(|| {
            SecurityError::IllegalState("Script evaluator is not configured".to_string())
        })?;
        let script = script.to_string();
        let predicate = ConstraintPredicate::new(move |entity| scripts.evaluate(entity, &script));
        self.with_in_memory(entity_name, operation, predicate)
    }

    /// Joined sets first, then this builder's own constraints; lists are
    /// concatenated per entity.
    pub fn build(self) -> SetOfEntityConstraints {
        let mut result: HashMap<String, Vec<EntityConstraint>> = HashMap::new();
        for join_set in self.join_sets {
            for (entity, constraints) in join_set.constraints() {
                result
                    .entry(entity.clone())
                    .or_default()
                    .extend(constraints.iter().cloned());
            }
        }
        for (entity, constraints) in self.builder_constraints {
            result.entry(entity).or_default().extend(constraints);
        }
        SetOfEntityConstraints::new(result)
    }

    fn add_constraint(&mut self, entity_type: String, constraint: EntityConstraint) {
        let constraints = self.builder_constraints.entry(entity_type).or_default();
        let existing = constraints
            .iter()
            .position(|c| c.operation() == constraint.operation());

        let Some(index) = existing else {
            constraints.push(constraint);
            return;
        };

        match constraint {
            EntityConstraint::Jpql(mut jpql) => {
                if constraints[index].is_jpql() {
                    constraints.push(EntityConstraint::Jpql(jpql));
                } else {
                    let replaced = constraints.remove(index);
                    jpql.predicate = replaced.predicate().cloned();
                    constraints.push(EntityConstraint::Jpql(jpql));
                }
            }
            EntityConstraint::InMemory(in_memory) => {
                if let EntityConstraint::Jpql(jpql) = &mut constraints[index] {
                    if jpql.predicate.is_none() {
                        jpql.predicate = Some(in_memory.predicate);
                        return;
                    }
                }
                constraints.push(EntityConstraint::InMemory(in_memory));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entity::Entity;
    use crate::models::metadata::MetaClass;

    fn metadata() -> Arc<Metadata> {
        Arc::new(
            Metadata::new()
                .with_class(MetaClass::new("sec$User"))
                .with_class(MetaClass::new("sec$Group")),
        )
    }

    fn active() -> ConstraintPredicate {
        ConstraintPredicate::new(|e: &Entity| e.value("active").and_then(|v| v.as_bool()) == Some(true))
    }

    struct NameScript;

    impl ScriptEvaluator for NameScript {
        fn evaluate(&self, entity: &Entity, script: &str) -> bool {
            entity.value("name").and_then(|v| v.as_str()) == Some(script)
        }
    }

    #[test]
    fn test_unknown_entity_is_rejected() {
        let result = AccessConstraintsBuilder::new(metadata()).with_jpql("sec$Missing", "1 = 1", None);
        assert!(matches!(result, Err(SecurityError::InvalidArgument(_))));
    }

    #[test]
    fn test_jpql_after_in_memory_takes_over_predicate() {
        let predicate = active();
        let set = AccessConstraintsBuilder::new(metadata())
            .with_in_memory("sec$User", EntityOp::Read, predicate.clone())
            .unwrap()
            .with_jpql("sec$User", "{E}.active = true", Some(""))
            .unwrap()
            .build();

        let constraints = set.for_entity("sec$User");
        assert_eq!(constraints.len(), 1);
        match &constraints[0] {
            EntityConstraint::Jpql(jpql) => {
                assert!(jpql.predicate.as_ref().unwrap().same_as(&predicate));
                assert_eq!(jpql.join_clause, None);
            }
            other => panic!("expected JPQL constraint, got {:?}", other),
        }
    }

    #[test]
    fn test_two_jpql_constraints_are_both_kept() {
        let set = AccessConstraintsBuilder::new(metadata())
            .with_jpql("sec$User", "{E}.active = true", None)
            .unwrap()
            .with_jpql("sec$User", "{E}.login <> 'admin'", None)
            .unwrap()
            .build();

        assert_eq!(set.constraints_for("sec$User", EntityOp::Read).len(), 2);
    }

    #[test]
    fn test_in_memory_attaches_to_bare_jpql() {
        let predicate = active();
        let set = AccessConstraintsBuilder::new(metadata())
            .with_jpql("sec$User", "{E}.active = true", None)
            .unwrap()
            .with_in_memory("sec$User", EntityOp::Read, predicate.clone())
            .unwrap()
            .with_in_memory("sec$User", EntityOp::Read, active())
            .unwrap()
            .build();

        let constraints = set.for_entity("sec$User");
        assert_eq!(constraints.len(), 2);
        assert!(constraints[0].is_jpql());
        assert!(constraints[0].predicate().unwrap().same_as(&predicate));
        assert!(!constraints[1].is_jpql());
    }

    #[test]
    fn test_in_memory_for_other_operation_is_appended() {
        let set = AccessConstraintsBuilder::new(metadata())
            .with_jpql("sec$User", "{E}.active = true", None)
            .unwrap()
            .with_in_memory("sec$User", EntityOp::Update, active())
            .unwrap()
            .build();

        assert_eq!(set.for_entity("sec$User").len(), 2);
        assert!(set.constraints_for("sec$User", EntityOp::Read)[0].predicate().is_none());
    }

    #[test]
    fn test_build_concatenates_joined_sets() {
        let joined = AccessConstraintsBuilder::new(metadata())
            .with_jpql("sec$User", "{E}.active = true", None)
            .unwrap()
            .build();

        let set = AccessConstraintsBuilder::new(metadata())
            .join(joined.clone())
            .join(joined)
            .with_jpql("sec$User", "{E}.login <> 'admin'", None)
            .unwrap()
            .with_in_memory("sec$Group", EntityOp::Delete, active())
            .unwrap()
            .build();

        assert_eq!(set.for_entity("sec$User").len(), 3);
        assert_eq!(set.for_entity("sec$Group").len(), 1);
    }

    #[test]
    fn test_groovy_constraint_uses_script_evaluator() {
        let set = AccessConstraintsBuilder::new(metadata())
            .with_script_evaluator(Arc::new(NameScript))
            .with_groovy("sec$Group", EntityOp::Update, "Company")
            .unwrap()
            .build();

        let constraint = set.constraints_for("sec$Group", EntityOp::Update)[0];
        assert!(constraint.permits(&Entity::new("sec$Group", 1).with("name", "Company")));
        assert!(!constraint.permits(&Entity::new("sec$Group", 2).with("name", "Other")));
    }

    #[test]
    fn test_groovy_without_evaluator_fails() {
        let result = AccessConstraintsBuilder::new(metadata()).with_groovy("sec$Group", EntityOp::Read, "true");
        assert!(matches!(result, Err(SecurityError::IllegalState(_))));
    }
}
