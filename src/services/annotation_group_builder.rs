//! 注解访问组编译器
//! 将声明式访问组中的方法注解编译为约束集合与会话属性

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use moka::sync::Cache;

use crate::config::SecurityConfig;
use crate::error::{Result, SecurityError};
use crate::models::datatype::{AttributeValue, DatatypeRegistry};
use crate::models::declaration::{
    Annotation, AnnotationKind, DeclaredMethod, GroupAnnotation, GroupDefinition,
};
use crate::models::group::{ConstraintPredicate, GroupDef, ScriptEvaluator, SetOfEntityConstraints};
use crate::models::metadata::Metadata;
use crate::services::access_constraints_builder::AccessConstraintsBuilder;
use crate::services::group_def_builder::GroupDefBuilder;

const NAME_METHOD: &str = "name";
const SESSION_ATTRIBUTES_METHOD: &str = "session_attributes";

/// Methods describing the group itself rather than its constraints.
const FILTERED_METHOD_NAMES: [&str; 2] = [NAME_METHOD, SESSION_ATTRIBUTES_METHOD];

struct AnnotationContext<'a> {
    annotation: &'a Annotation,
    method: &'a DeclaredMethod,
    owner: &'a str,
}

type ConstraintsProcessor =
    fn(&AnnotationGroupDefBuilder, &AnnotationContext<'_>, AccessConstraintsBuilder) -> Result<AccessConstraintsBuilder>;
type SessionAttributesProcessor =
    fn(&AnnotationGroupDefBuilder, &AnnotationContext<'_>, &mut HashMap<String, AttributeValue>) -> Result<()>;

#[derive(Clone, Copy)]
enum Processor {
    Constraints(ConstraintsProcessor),
    SessionAttributes(SessionAttributesProcessor),
}

pub struct AnnotationGroupDefBuilder {
    metadata: Arc<Metadata>,
    datatypes: DatatypeRegistry,
    scripts: Option<Arc<dyn ScriptEvaluator>>,
    processors: HashMap<AnnotationKind, Processor>,
    predicate_cache: Cache<(String, String), ConstraintPredicate>,
}

impl AnnotationGroupDefBuilder {
    pub fn new(metadata: Arc<Metadata>, datatypes: DatatypeRegistry, config: &SecurityConfig) -> Self {
        let mut builder = Self {
            metadata,
            datatypes,
            scripts: None,
            processors: HashMap::new(),
            predicate_cache: Cache::builder()
                .max_capacity(config.predicate_cache_capacity)
                .build(),
        };
        builder.register_processor(AnnotationKind::JpqlConstraint, Processor::Constraints(process_jpql));
        builder.register_processor(AnnotationKind::Constraint, Processor::Constraints(process_constraint));
        builder.register_processor(
            AnnotationKind::SessionAttribute,
            Processor::SessionAttributes(process_session_attribute),
        );
        builder
    }

    pub fn with_script_evaluator(mut self, scripts: Arc<dyn ScriptEvaluator>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn name_from_annotation(&self, group: &dyn GroupDefinition) -> Result<String> {
        Ok(group_annotation_nn(group)?.name)
    }

    pub fn build_set_of_entity_constraints(&self, group: &dyn GroupDefinition) -> Result<SetOfEntityConstraints> {
        let mut constraints = self.constraints_builder();

        for method in group.methods() {
            if !is_constraint_method(&method) {
                continue;
            }
            for annotation in &method.annotations {
                if let Some(Processor::Constraints(process)) = self.find_processor(annotation) {
                    let context = AnnotationContext {
                        annotation,
                        method: &method,
                        owner: group.owner(),
                    };
                    constraints = process(self, &context, constraints)?;
                }
            }
        }

        Ok(constraints.build())
    }

    pub fn build_session_attributes(&self, group: &dyn GroupDefinition) -> Result<HashMap<String, AttributeValue>> {
        let mut session_attributes = HashMap::new();

        for method in group.methods() {
            if method.name != SESSION_ATTRIBUTES_METHOD {
                continue;
            }
            for annotation in &method.annotations {
                if let Some(Processor::SessionAttributes(process)) = self.find_processor(annotation) {
                    let context = AnnotationContext {
                        annotation,
                        method: &method,
                        owner: group.owner(),
                    };
                    process(self, &context, &mut session_attributes)?;
                }
            }
        }

        Ok(session_attributes)
    }

    /// Compiles the group and its parent chain into a [`GroupDef`].
    pub fn build_group_def(&self, group: &dyn GroupDefinition) -> Result<GroupDef> {
        let mut visited = HashSet::new();
        self.build_group_def_inner(group, &mut visited)
    }

    fn build_group_def_inner(&self, group: &dyn GroupDefinition, visited: &mut HashSet<String>) -> Result<GroupDef> {
        let annotation = group_annotation_nn(group)?;
        if !visited.insert(group.owner().to_string()) {
            return Err(SecurityError::IllegalState(format!(
                "Cyclic parent reference in group {}",
                group.owner()
            )));
        }

        let mut builder = GroupDefBuilder::new(self.metadata.clone()).with_name(&annotation.name);
        if let Some(parent) = &annotation.parent {
            let parent_def = self.build_group_def_inner(parent.as_ref(), visited)?;
            builder = builder.with_parent(&parent_def);
        }

        let constraints = self.build_set_of_entity_constraints(group)?;
        builder = builder.with_constraints(|c| Ok(c.join(constraints)))?;
        for (key, value) in self.build_session_attributes(group)? {
            builder = builder.with_session_attribute(key, value);
        }

        tracing::debug!(group = %annotation.name, owner = %group.owner(), "Compiled group definition");
        Ok(builder.build())
    }

    fn register_processor(&mut self, kind: AnnotationKind, processor: Processor) {
        self.processors.insert(kind, processor);
    }

    fn find_processor(&self, annotation: &Annotation) -> Option<Processor> {
        self.processors.get(&annotation.kind()).copied()
    }

    fn constraints_builder(&self) -> AccessConstraintsBuilder {
        let builder = AccessConstraintsBuilder::new(self.metadata.clone());
        match &self.scripts {
            Some(scripts) => builder.with_script_evaluator(scripts.clone()),
            None => builder,
        }
    }

    fn resolve_target_class(&self, method: &DeclaredMethod) -> Result<String> {
        if let [parameter] = method.parameters.as_slice() {
            if self.metadata.contains(parameter) {
                return Ok(parameter.clone());
            }
        }
        Err(SecurityError::IllegalState(format!(
            "Method [{}] must have only one parameter with Entity argument",
            method.name
        )))
    }

    fn create_constraint_predicate(&self, method: &DeclaredMethod, owner: &str) -> Result<ConstraintPredicate> {
        let key = (owner.to_string(), method.name.clone());
        if let Some(predicate) = self.predicate_cache.get(&key) {
            return Ok(predicate);
        }

        metrics::counter!("security.predicate_cache.miss").increment(1);
        let body = method.body.ok_or_else(|| {
            SecurityError::IllegalState("Can't create in-memory constraint predicate".to_string())
        })?;
        let predicate = ConstraintPredicate::new(move |entity| body(entity));
        tracing::debug!(owner = %owner, method = %method.name, "Created constraint predicate");

        self.predicate_cache.insert(key, predicate.clone());
        Ok(predicate)
    }
}

fn group_annotation_nn(group: &dyn GroupDefinition) -> Result<GroupAnnotation> {
    group
        .annotation()
        .ok_or_else(|| SecurityError::IllegalState("The class must have @Group annotation.".to_string()))
}

fn is_constraint_method(method: &DeclaredMethod) -> bool {
    !FILTERED_METHOD_NAMES.contains(&method.name.as_str())
}

fn empty_to_none(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

fn process_jpql(
    compiler: &AnnotationGroupDefBuilder,
    context: &AnnotationContext<'_>,
    constraints: AccessConstraintsBuilder,
) -> Result<AccessConstraintsBuilder> {
    let Annotation::JpqlConstraint {
        target,
        value,
        where_clause,
        join,
    } = context.annotation
    else {
        return Ok(constraints);
    };

    let target = match target.as_deref().and_then(empty_to_none) {
        Some(target) => target.to_string(),
        None => compiler.resolve_target_class(context.method)?,
    };
    let where_clause = empty_to_none(value).or_else(|| empty_to_none(where_clause)).unwrap_or_default();
    constraints.with_jpql(&target, where_clause, empty_to_none(join))
}

fn process_constraint(
    compiler: &AnnotationGroupDefBuilder,
    context: &AnnotationContext<'_>,
    mut constraints: AccessConstraintsBuilder,
) -> Result<AccessConstraintsBuilder> {
    let Annotation::Constraint { operations } = context.annotation else {
        return Ok(constraints);
    };

    let target = compiler.resolve_target_class(context.method)?;
    for operation in operations {
        let predicate = compiler.create_constraint_predicate(context.method, context.owner)?;
        constraints = constraints.with_in_memory(&target, *operation, predicate)?;
    }
    Ok(constraints)
}

fn process_session_attribute(
    compiler: &AnnotationGroupDefBuilder,
    context: &AnnotationContext<'_>,
    session_attributes: &mut HashMap<String, AttributeValue>,
) -> Result<()> {
    let Annotation::SessionAttribute { name, value, datatype } = context.annotation else {
        return Ok(());
    };

    let parser = compiler.datatypes.get(datatype).ok_or_else(|| {
        SecurityError::IllegalState(format!("Datatype {} is not registered", datatype))
    })?;
    let parsed = parser.parse(value).map_err(|source| SecurityError::SessionAttribute {
        attribute: name.clone(),
        group: context.owner.to_string(),
        source,
    })?;
    session_attributes.insert(name.clone(), parsed);
    Ok(())
}
