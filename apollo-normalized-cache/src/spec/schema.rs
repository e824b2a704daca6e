//! GraphQL schema.

use apollo_compiler::ExecutableDocument;
use apollo_compiler::ast;
use apollo_compiler::executable;
use apollo_compiler::validation::Valid;
use indexmap::IndexMap;

use crate::error::SpecError;
use crate::spec::FieldType;
use crate::spec::SelectionNode;
use crate::spec::TypeOracle;

const UNSUPPORTED_DIRECTIVES: [&str; 2] = ["skip", "include"];

/// A validated GraphQL schema.
#[derive(Debug)]
pub struct Schema {
    definitions: Valid<apollo_compiler::Schema>,
}

impl Schema {
    pub fn parse(sdl: &str) -> Result<Self, SpecError> {
        let mut parser = apollo_compiler::parser::Parser::new();
        let definitions = parser
            .parse_ast(sdl, "schema.graphql")
            .map_err(|invalid| SpecError::ParsingError(invalid.errors.to_string()))?
            .to_schema_validate()
            .map_err(|invalid| SpecError::ValidationError(invalid.errors.to_string()))?;
        Ok(Schema { definitions })
    }

    /// Validates `query` and builds the selection tree of one of its operations.
    ///
    /// Fragments are flattened into the selection they are spread in.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn selection_set(
        &self,
        query: &str,
        operation_name: Option<&str>,
    ) -> Result<Vec<SelectionNode>, SpecError> {
        let mut parser = apollo_compiler::parser::Parser::new();
        let document = parser
            .parse_ast(query, "query.graphql")
            .map_err(|invalid| SpecError::ParsingError(invalid.errors.to_string()))?
            .to_executable_validate(&self.definitions)
            .map_err(|invalid| SpecError::ValidationError(invalid.errors.to_string()))?;

        let operation = document.operations.get(operation_name).map_err(|_| {
            SpecError::UnknownOperation(operation_name.unwrap_or_default().to_string())
        })?;
        match operation.operation_type {
            ast::OperationType::Query => {}
            ast::OperationType::Mutation => {
                return Err(SpecError::UnsupportedOperation("mutation".to_string()));
            }
            ast::OperationType::Subscription => {
                return Err(SpecError::UnsupportedOperation("subscription".to_string()));
            }
        }
        if let Some(variable) = operation.variables.first() {
            return Err(SpecError::UnsupportedVariable(variable.name.to_string()));
        }

        let selections = self.build_selections(
            &document,
            operation.selection_set.ty.as_str(),
            &[&operation.selection_set],
        )?;
        tracing::trace!(
            root_fields = selections.len(),
            "built selection tree for operation {:?}",
            operation_name
        );
        Ok(selections)
    }

    /// Builds the selection tree of `selection_sets`, all selected on `parent_type`.
    ///
    /// Fields are collected separately for every concrete type of `parent_type`.
    /// A field selected the same way on all of them is unconditional; otherwise
    /// each variant carries the concrete types it applies to, and variants sharing
    /// a response key never share a type.
    fn build_selections(
        &self,
        document: &ExecutableDocument,
        parent_type: &str,
        selection_sets: &[&executable::SelectionSet],
    ) -> Result<Vec<SelectionNode>, SpecError> {
        let mut object_types = self.possible_types(parent_type);
        if object_types.is_empty() {
            object_types.push(parent_type.to_string());
        }

        let mut output: Vec<SelectionNode> = Vec::new();
        for object_type in &object_types {
            let mut fields = IndexMap::new();
            for selection_set in selection_sets {
                self.collect_fields(document, selection_set, object_type, &mut fields)?;
            }

            let nodes = fields
                .into_values()
                .map(|collected| self.build_field(document, collected))
                .collect::<Result<Vec<_>, _>>()?;

            // keeps this type's field order among the nodes that apply to it
            let mut cursor = 0;
            for (position, node) in nodes.iter().enumerate() {
                match find_selection(&output, cursor, node) {
                    Some(index) => {
                        if let Some(existing) = output.get_mut(index) {
                            existing
                                .possible_types
                                .get_or_insert_with(Vec::new)
                                .push(object_type.clone());
                        }
                        cursor = index + 1;
                    }
                    None => {
                        // right before the next node of this type that is already placed
                        let index = nodes
                            .iter()
                            .skip(position + 1)
                            .find_map(|later| find_selection(&output, cursor, later))
                            .unwrap_or(output.len());
                        output.insert(
                            index,
                            node.clone().with_possible_types([object_type.as_str()]),
                        );
                        cursor = index + 1;
                    }
                }
            }
        }

        for node in &mut output {
            if node
                .possible_types
                .as_ref()
                .is_some_and(|types| types.len() == object_types.len())
            {
                node.possible_types = None;
            }
        }
        Ok(output)
    }

    /// Collects the fields `selection_set` selects on objects of type `object_type`,
    /// grouped by response key in first-occurrence order.
    // Spec: https://spec.graphql.org/draft/#CollectFields()
    fn collect_fields<'doc>(
        &self,
        document: &'doc ExecutableDocument,
        selection_set: &'doc executable::SelectionSet,
        object_type: &str,
        fields: &mut IndexMap<&'doc str, CollectedField<'doc>>,
    ) -> Result<(), SpecError> {
        for selection in &selection_set.selections {
            match selection {
                executable::Selection::Field(field) => {
                    check_directives(&field.directives)?;
                    let field: &executable::Field = field;
                    let response_key = field.alias.as_ref().unwrap_or(&field.name).as_str();
                    fields
                        .entry(response_key)
                        .or_insert_with(|| CollectedField {
                            field,
                            selection_sets: Vec::new(),
                        })
                        .selection_sets
                        .push(&field.selection_set);
                }
                executable::Selection::InlineFragment(inline_fragment) => {
                    check_directives(&inline_fragment.directives)?;
                    let applies = inline_fragment
                        .type_condition
                        .as_ref()
                        .is_none_or(|condition| self.applies_to(condition.as_str(), object_type));
                    if applies {
                        self.collect_fields(
                            document,
                            &inline_fragment.selection_set,
                            object_type,
                            fields,
                        )?;
                    }
                }
                executable::Selection::FragmentSpread(fragment_spread) => {
                    check_directives(&fragment_spread.directives)?;
                    let fragment = fragment_spread.fragment_def(document).ok_or_else(|| {
                        SpecError::ValidationError(format!(
                            "unknown fragment \"{}\"",
                            fragment_spread.fragment_name
                        ))
                    })?;
                    if self.applies_to(fragment.selection_set.ty.as_str(), object_type) {
                        self.collect_fields(document, &fragment.selection_set, object_type, fields)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn build_field(
        &self,
        document: &ExecutableDocument,
        collected: CollectedField<'_>,
    ) -> Result<SelectionNode, SpecError> {
        let field = collected.field;
        let field_type = FieldType::from(field.ty());
        let children = if field.selection_set.selections.is_empty() {
            None
        } else {
            Some(self.build_selections(
                document,
                field.selection_set.ty.as_str(),
                &collected.selection_sets,
            )?)
        };
        let arguments = field
            .arguments
            .iter()
            .map(|argument| {
                let value: &ast::Value = &argument.value;
                crate::spec::Argument {
                    name: argument.name.to_string(),
                    value: value.to_string(),
                }
            })
            .collect();

        Ok(SelectionNode {
            name: field.name.to_string(),
            alias: field.alias.as_ref().map(|alias| alias.to_string()),
            is_list: field_type.is_list(),
            field_type,
            arguments,
            possible_types: None,
            children,
        })
    }

    /// Whether a fragment with `type_condition` applies to objects of `object_type`.
    fn applies_to(&self, type_condition: &str, object_type: &str) -> bool {
        type_condition == object_type || self.definitions.is_subtype(type_condition, object_type)
    }

    /// Concrete object types a value of type `type_condition` can have.
    pub fn possible_types(&self, type_condition: &str) -> Vec<String> {
        if self.definitions.get_object(type_condition).is_some() {
            return vec![type_condition.to_string()];
        }
        self.definitions
            .types
            .iter()
            .filter(|(name, ty)| {
                ty.is_object() && self.definitions.is_subtype(type_condition, name.as_str())
            })
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

/// Every selection of one response key on one concrete type.
struct CollectedField<'doc> {
    /// The first selection, which names the field and its arguments.
    field: &'doc executable::Field,
    selection_sets: Vec<&'doc executable::SelectionSet>,
}

impl TypeOracle for Schema {
    fn is_list_type(&self, field_type: &FieldType) -> bool {
        field_type.is_list()
    }
}

fn check_directives(directives: &executable::DirectiveList) -> Result<(), SpecError> {
    match directives
        .iter()
        .find(|directive| UNSUPPORTED_DIRECTIVES.contains(&directive.name.as_str()))
    {
        Some(directive) => Err(SpecError::UnsupportedDirective(directive.name.to_string())),
        None => Ok(()),
    }
}

/// Index of the first node at or after `from` that selects the same thing as `node`.
fn find_selection(output: &[SelectionNode], from: usize, node: &SelectionNode) -> Option<usize> {
    output
        .iter()
        .skip(from)
        .position(|existing| same_selection(existing, node))
        .map(|offset| from + offset)
}

/// Whether two nodes select the same thing, type conditions aside.
fn same_selection(a: &SelectionNode, b: &SelectionNode) -> bool {
    a.name == b.name
        && a.alias == b.alias
        && a.field_type == b.field_type
        && a.is_list == b.is_list
        && a.arguments == b.arguments
        && a.children == b.children
}
