use crate::analyzer::{ClassSymbol, FileSymbols, FunctionSymbol, SymbolAnalyzer};
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use tree_sitter::{Node, Parser, Tree};

/// Node kinds that add one branch to the complexity estimate
const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "if_expression",
    "for_statement",
    "for_in_statement",
    "for_expression",
    "while_statement",
    "while_expression",
    "loop_expression",
    "do_statement",
    "except_clause",
    "catch_clause",
    "conditional_expression",
    "ternary_expression",
    "switch_case",
    "case_clause",
    "match_arm",
    "boolean_operator",
];

/// Tree-sitter backed analyzer reporting top-level functions and classes
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterAnalyzer {
    language: Language,
}

#[derive(Default)]
struct ParsedSymbols {
    functions: Vec<FunctionSymbol>,
    classes: Vec<ClassSymbol>,
}

impl TreeSitterAnalyzer {
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    fn parse(&self, content: &str) -> Result<Tree> {
        let grammar = self
            .language
            .grammar()
            .ok_or_else(|| ChunkerError::unsupported_language(self.language.name()))?;
        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;
        parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::parse("Failed to parse source code"))
    }

    fn analyze(&self, content: &str) -> Result<ParsedSymbols> {
        let tree = self.parse(content)?;
        let root = tree.root_node();
        if root.has_error() {
            log::debug!(
                "Syntax errors in {} source; reporting recoverable symbols only",
                self.language.name()
            );
        }

        let mut symbols = ParsedSymbols::default();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match self.language {
                Language::Python => Self::visit_python(content, child, child, &mut symbols),
                Language::Rust => Self::visit_rust(content, child, &mut symbols),
                Language::JavaScript | Language::TypeScript | Language::Tsx => {
                    Self::visit_js(content, child, child, &mut symbols);
                }
                Language::Unknown => {}
            }
        }
        Ok(symbols)
    }

    /// `outer` is the node whose range the symbol covers (decorators included)
    fn visit_python(content: &str, outer: Node, node: Node, symbols: &mut ParsedSymbols) {
        match node.kind() {
            "function_definition" => {
                if let Some(function) = Self::function_symbol(content, outer, node) {
                    symbols.functions.push(function);
                }
            }
            "class_definition" => {
                let methods = node
                    .child_by_field_name("body")
                    .map(|body| Self::member_names(content, body, &["function_definition"]))
                    .unwrap_or_default();
                if let Some(class) = Self::class_symbol(content, outer, node, methods) {
                    symbols.classes.push(class);
                }
            }
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    Self::visit_python(content, outer, definition, symbols);
                }
            }
            _ => {}
        }
    }

    fn visit_rust(content: &str, node: Node, symbols: &mut ParsedSymbols) {
        match node.kind() {
            "function_item" => {
                if let Some(function) = Self::function_symbol(content, node, node) {
                    symbols.functions.push(function);
                }
            }
            "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                let methods = node
                    .child_by_field_name("body")
                    .map(|body| {
                        Self::member_names(
                            content,
                            body,
                            &["function_item", "function_signature_item"],
                        )
                    })
                    .unwrap_or_default();
                if let Some(class) = Self::class_symbol(content, node, node, methods) {
                    symbols.classes.push(class);
                }
            }
            "impl_item" => {
                let Some(target) = node
                    .child_by_field_name("type")
                    .and_then(|ty| Self::rust_type_name(content, ty))
                else {
                    log::debug!("Skipping impl block without a resolvable target type");
                    return;
                };
                let methods = node
                    .child_by_field_name("body")
                    .map(|body| Self::member_names(content, body, &["function_item"]))
                    .unwrap_or_default();
                symbols.classes.push(ClassSymbol {
                    name: target,
                    start_line: node.start_position().row + 1,
                    end_line: node.end_position().row + 1,
                    methods,
                });
            }
            _ => {}
        }
    }

    fn visit_js(content: &str, outer: Node, node: Node, symbols: &mut ParsedSymbols) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(function) = Self::function_symbol(content, outer, node) {
                    symbols.functions.push(function);
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                let methods = node
                    .child_by_field_name("body")
                    .map(|body| {
                        Self::member_names(
                            content,
                            body,
                            &[
                                "method_definition",
                                "method_signature",
                                "abstract_method_signature",
                            ],
                        )
                    })
                    .unwrap_or_default();
                if let Some(class) = Self::class_symbol(content, outer, node, methods) {
                    symbols.classes.push(class);
                }
            }
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    Self::visit_js(content, outer, declaration, symbols);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut cursor = node.walk();
                for declarator in node.named_children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(value) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    if !matches!(
                        value.kind(),
                        "arrow_function" | "function_expression" | "function" | "generator_function"
                    ) {
                        continue;
                    }
                    let Some(name) = declarator
                        .child_by_field_name("name")
                        .and_then(|n| node_text(content, n))
                    else {
                        continue;
                    };
                    let parameters = value
                        .child_by_field_name("parameters")
                        .or_else(|| value.child_by_field_name("parameter"))
                        .map(|params| Self::parameter_names(content, params))
                        .unwrap_or_default();
                    symbols.functions.push(FunctionSymbol {
                        name: name.to_string(),
                        start_line: outer.start_position().row + 1,
                        end_line: outer.end_position().row + 1,
                        parameters,
                        complexity: 1 + count_branches(content, value),
                    });
                }
            }
            _ => {}
        }
    }

    fn function_symbol(content: &str, outer: Node, node: Node) -> Option<FunctionSymbol> {
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| node_text(content, n))
        else {
            log::debug!(
                "Skipping anonymous function at line {}",
                node.start_position().row + 1
            );
            return None;
        };
        let parameters = node
            .child_by_field_name("parameters")
            .map(|params| Self::parameter_names(content, params))
            .unwrap_or_default();
        Some(FunctionSymbol {
            name: name.to_string(),
            start_line: outer.start_position().row + 1,
            end_line: outer.end_position().row + 1,
            parameters,
            complexity: 1 + count_branches(content, node),
        })
    }

    fn class_symbol(
        content: &str,
        outer: Node,
        node: Node,
        methods: Vec<String>,
    ) -> Option<ClassSymbol> {
        let Some(name) = node
            .child_by_field_name("name")
            .and_then(|n| node_text(content, n))
        else {
            log::debug!(
                "Skipping anonymous class at line {}",
                node.start_position().row + 1
            );
            return None;
        };
        Some(ClassSymbol {
            name: name.to_string(),
            start_line: outer.start_position().row + 1,
            end_line: outer.end_position().row + 1,
            methods,
        })
    }

    /// Names of direct members of `body` whose kind is in `kinds` (decorators unwrapped)
    fn member_names(content: &str, body: Node, kinds: &[&str]) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let member = if member.kind() == "decorated_definition" {
                match member.child_by_field_name("definition") {
                    Some(definition) => definition,
                    None => continue,
                }
            } else {
                member
            };
            if !kinds.contains(&member.kind()) {
                continue;
            }
            if let Some(name) = member
                .child_by_field_name("name")
                .and_then(|n| node_text(content, n))
            {
                names.push(name.to_string());
            }
        }
        names
    }

    fn parameter_names(content: &str, params: Node) -> Vec<String> {
        // Single bare arrow-function parameter: `x => x + 1`
        if params.kind() == "identifier" {
            return node_text(content, params)
                .map(|name| vec![name.to_string()])
                .unwrap_or_default();
        }

        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if matches!(param.kind(), "comment" | "attribute_item") {
                continue;
            }
            let name_node = match param.kind() {
                "identifier" | "self_parameter" => Some(param),
                _ => ["pattern", "left", "name"]
                    .iter()
                    .find_map(|field| param.child_by_field_name(field))
                    .or_else(|| first_identifier(param)),
            };
            let text = name_node
                .or(Some(param))
                .and_then(|n| node_text(content, n))
                .map(str::trim);
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                names.push(text.to_string());
            }
        }
        names
    }

    fn rust_type_name(content: &str, ty: Node) -> Option<String> {
        match ty.kind() {
            "type_identifier" => node_text(content, ty).map(str::to_string),
            "generic_type" => ty
                .child_by_field_name("type")
                .and_then(|inner| Self::rust_type_name(content, inner)),
            "scoped_type_identifier" => ty
                .child_by_field_name("name")
                .and_then(|name| node_text(content, name))
                .map(str::to_string),
            _ => node_text(content, ty).map(str::to_string),
        }
    }
}

impl SymbolAnalyzer for TreeSitterAnalyzer {
    fn language(&self) -> Language {
        self.language
    }

    fn extract_functions(&self, content: &str) -> Result<Vec<FunctionSymbol>> {
        Ok(self.analyze(content)?.functions)
    }

    fn extract_classes(&self, content: &str) -> Option<Result<Vec<ClassSymbol>>> {
        Some(self.analyze(content).map(|symbols| symbols.classes))
    }

    /// One parse for both lists
    fn extract_symbols(&self, content: &str) -> FileSymbols {
        match self.analyze(content) {
            Ok(parsed) => FileSymbols {
                functions: Ok(parsed.functions),
                classes: Some(Ok(parsed.classes)),
            },
            Err(e) => FileSymbols {
                functions: Err(e),
                classes: None,
            },
        }
    }
}

fn node_text<'a>(content: &'a str, node: Node) -> Option<&'a str> {
    content.get(node.byte_range())
}

fn first_identifier(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == "identifier");
    found
}

fn count_branches(content: &str, node: Node) -> u32 {
    let mut count = u32::from(is_branch(content, node));
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count += count_branches(content, child);
    }
    count
}

fn is_branch(content: &str, node: Node) -> bool {
    if BRANCH_KINDS.contains(&node.kind()) {
        return true;
    }
    node.kind() == "binary_expression"
        && node
            .child_by_field_name("operator")
            .and_then(|op| node_text(content, op))
            .is_some_and(|op| op == "&&" || op == "||")
}
