use super::error::FilterError;
use super::parser::{EncryptionStatus, Instruction, Operator, Primitive, Side};
use super::ports::{PortTable, builtin_ports};
use crate::directory::{NodeDirectory, user_names};
use crate::identifiers::{NodeId, NodeNum, to_node_num, to_user_id, value_to_node_num};
use crate::packet::PacketRecord;
use serde_json::Value;

/// Evaluate compiled instructions against one packet with the built-in port table
pub fn evaluate(
    instructions: &[Instruction],
    packet: &PacketRecord<'_>,
    directory: Option<&dyn NodeDirectory>,
) -> Result<bool, FilterError> {
    evaluate_with_ports(instructions, packet, directory, builtin_ports())
}

/// Stack machine over postfix filter instructions
///
/// Primitives push their result, operators pop their operands and push the
/// combined value. Exactly one value must remain at the end; an empty
/// program matches everything.
pub fn evaluate_with_ports(
    instructions: &[Instruction],
    packet: &PacketRecord<'_>,
    directory: Option<&dyn NodeDirectory>,
    ports: &PortTable,
) -> Result<bool, FilterError> {
    if instructions.is_empty() {
        return Ok(true);
    }

    let mut stack: Vec<bool> = Vec::with_capacity(instructions.len());

    for instruction in instructions {
        match instruction {
            Instruction::Primitive(primitive) => {
                stack.push(eval_primitive(primitive, packet, directory, ports)?);
            }
            Instruction::Operator(op) => {
                if stack.len() < op.arity() {
                    return Err(FilterError::MissingOperand {
                        operator: op.canonical_name(),
                        required: op.arity(),
                    });
                }
                // Arity was checked above, the pops cannot fail.
                let rhs = stack.pop().unwrap_or_default();
                let result = match op {
                    Operator::Not => !rhs,
                    Operator::And => stack.pop().unwrap_or_default() && rhs,
                    Operator::Or => stack.pop().unwrap_or_default() || rhs,
                };
                stack.push(result);
            }
        }
    }

    match stack.as_slice() {
        [result] => Ok(*result),
        other => Err(FilterError::UnbalancedStack(other.len())),
    }
}

/// Evaluator owning its port alias table
#[derive(Debug, Clone, Default)]
pub struct FilterEvaluator {
    ports: PortTable,
}

impl FilterEvaluator {
    pub fn new(ports: PortTable) -> Self {
        Self { ports }
    }

    pub fn evaluate(
        &self,
        instructions: &[Instruction],
        packet: &PacketRecord<'_>,
        directory: Option<&dyn NodeDirectory>,
    ) -> Result<bool, FilterError> {
        evaluate_with_ports(instructions, packet, directory, &self.ports)
    }
}

fn eval_primitive(
    primitive: &Primitive,
    packet: &PacketRecord<'_>,
    directory: Option<&dyn NodeDirectory>,
    ports: &PortTable,
) -> Result<bool, FilterError> {
    let matched = match primitive {
        Primitive::Node { side, value } => eval_node(*side, value, packet),
        Primitive::User { side, value } => eval_user(*side, value, packet, directory),
        Primitive::Port(value) => packet.portnum().unwrap_or_default() == ports.resolve(value),
        Primitive::HopLimit { op, value } => {
            let target: i64 = value.trim().parse().map_err(|_| FilterError::InvalidValue {
                primitive: "hop_limit",
                value: value.clone(),
            })?;
            op.holds(packet.hop_limit(), target)
        }
        Primitive::Priority(value) => packet.priority() == value.to_uppercase(),
        Primitive::WantAck => packet.want_ack(),
        Primitive::Encryption(status) => {
            let (decoded, encrypted) = (packet.has_decoded(), packet.has_encrypted());
            match status {
                EncryptionStatus::Encrypted => encrypted && !decoded,
                EncryptionStatus::Plaintext => decoded && !encrypted,
            }
        }
    };
    Ok(matched)
}

/// A packet-side identifier that cannot be canonicalized never matches
fn eval_node(side: Side, value: &str, packet: &PacketRecord<'_>) -> bool {
    let canonical = |id: Option<&Value>| -> Option<NodeNum> {
        match id {
            Some(v) => value_to_node_num(v).ok(),
            None => to_node_num(NodeId::Text("")).ok(),
        }
    };

    let (Some(from), Some(to), Ok(wanted)) = (
        canonical(packet.from_id()),
        canonical(packet.to_id()),
        to_node_num(value),
    ) else {
        return false;
    };

    match side {
        Side::Src => from == wanted,
        Side::Dst => to == wanted,
        Side::Both => from == wanted || to == wanted,
    }
}

fn eval_user(
    side: Side,
    value: &str,
    packet: &PacketRecord<'_>,
    directory: Option<&dyn NodeDirectory>,
) -> bool {
    let Some(directory) = directory.filter(|d| !d.is_empty()) else {
        return false;
    };

    let matches = |id: Option<&Value>| {
        id.and_then(|id| lookup_record(directory, id))
            .is_some_and(|record| user_names(&record).matches(value))
    };

    match side {
        Side::Src => matches(packet.from_id()),
        Side::Dst => matches(packet.to_id()),
        Side::Both => matches(packet.from_id()) || matches(packet.to_id()),
    }
}

/// Find the directory record for a packet identifier.
///
/// String ids are tried verbatim first, then in canonical `!xxxxxxxx` form;
/// numeric ids only in canonical form. Directory failures count as misses.
fn lookup_record(directory: &dyn NodeDirectory, id: &Value) -> Option<Value> {
    let mut keys: Vec<String> = Vec::with_capacity(2);
    if let Value::String(s) = id {
        if s.is_empty() {
            return None;
        }
        keys.push(s.clone());
    }
    if let Ok(num) = value_to_node_num(id) {
        let canonical = to_user_id(num.value());
        if !keys.contains(&canonical) {
            keys.push(canonical);
        }
    }

    keys.iter()
        .find_map(|key| directory.lookup(key).ok().flatten())
}
