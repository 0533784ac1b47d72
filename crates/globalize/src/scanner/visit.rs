//! Tree walk with an explicit ancestor stack.

use super::syntax::{Attribute, AttributeItem, AttributeValue, Element, Node, Position};

/// One enclosing construct of the node being visited, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestor<'ast> {
    Element(Option<&'ast str>),
    Attribute(&'ast str),
    Expression,
    Template,
    Call(&'ast str),
    Group,
}

/// Callbacks for the literal-bearing nodes. Every method defaults to a no-op.
pub trait Visitor<'ast> {
    fn visit_text(&mut self, _value: &'ast str, _pos: Position, _ancestors: &[Ancestor<'ast>]) {}

    fn visit_string(&mut self, _value: &'ast str, _pos: Position, _ancestors: &[Ancestor<'ast>]) {}

    /// Called for every named attribute before its value is walked.
    fn visit_attribute(&mut self, _attribute: &'ast Attribute, _ancestors: &[Ancestor<'ast>]) {}
}

pub fn walk<'ast, V: Visitor<'ast>>(nodes: &'ast [Node], visitor: &mut V) {
    let mut stack = Vec::new();
    walk_nodes(nodes, visitor, &mut stack);
}

fn walk_nodes<'ast, V: Visitor<'ast>>(
    nodes: &'ast [Node],
    visitor: &mut V,
    stack: &mut Vec<Ancestor<'ast>>,
) {
    for node in nodes {
        match node {
            Node::Element(element) => walk_element(element, visitor, stack),
            Node::Text { value, pos } => visitor.visit_text(value, *pos, stack),
            Node::StringLiteral { value, pos } => visitor.visit_string(value, *pos, stack),
            Node::Expression(children) => nested(Ancestor::Expression, children, visitor, stack),
            Node::Group(children) => nested(Ancestor::Group, children, visitor, stack),
            Node::Call { callee, arguments } => {
                nested(Ancestor::Call(callee), arguments, visitor, stack)
            }
            Node::Template { expressions } => {
                stack.push(Ancestor::Template);
                for expression in expressions {
                    walk_nodes(expression, visitor, stack);
                }
                stack.pop();
            }
        }
    }
}

fn nested<'ast, V: Visitor<'ast>>(
    ancestor: Ancestor<'ast>,
    children: &'ast [Node],
    visitor: &mut V,
    stack: &mut Vec<Ancestor<'ast>>,
) {
    stack.push(ancestor);
    walk_nodes(children, visitor, stack);
    stack.pop();
}

fn walk_element<'ast, V: Visitor<'ast>>(
    element: &'ast Element,
    visitor: &mut V,
    stack: &mut Vec<Ancestor<'ast>>,
) {
    stack.push(Ancestor::Element(element.name.as_deref()));

    for item in &element.attributes {
        match item {
            AttributeItem::Named(attribute) => {
                visitor.visit_attribute(attribute, stack);
                stack.push(Ancestor::Attribute(&attribute.name));
                match &attribute.value {
                    Some(AttributeValue::Expression(nodes)) => walk_nodes(nodes, visitor, stack),
                    Some(AttributeValue::Element(inner)) => walk_element(inner, visitor, stack),
                    Some(AttributeValue::String { .. }) | None => {}
                }
                stack.pop();
            }
            AttributeItem::Spread(nodes) => walk_nodes(nodes, visitor, stack),
        }
    }

    walk_nodes(&element.children, visitor, stack);
    stack.pop();
}
