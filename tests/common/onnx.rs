//! Minimal ONNX graphs encoded by hand
//!
//! Only the protobuf fields ONNX Runtime needs to load a single-node graph
//! are written.

/// `TensorProto.DataType.FLOAT`
const ELEM_TYPE_FLOAT: u64 = 1;
const IR_VERSION: u64 = 7;
const OPSET_VERSION: u64 = 13;

fn varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn varint_field(field: u64, value: u64, out: &mut Vec<u8>) {
    varint(field << 3, out);
    varint(value, out);
}

fn bytes_field(field: u64, bytes: &[u8], out: &mut Vec<u8>) {
    varint((field << 3) | 2, out);
    varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn value_info(name: &str, shape: &[u64]) -> Vec<u8> {
    let mut dims = Vec::new();
    for &dim in shape {
        let mut dimension = Vec::new();
        varint_field(1, dim, &mut dimension);
        bytes_field(1, &dimension, &mut dims);
    }

    let mut tensor_type = Vec::new();
    varint_field(1, ELEM_TYPE_FLOAT, &mut tensor_type);
    bytes_field(2, &dims, &mut tensor_type);

    let mut type_proto = Vec::new();
    bytes_field(1, &tensor_type, &mut type_proto);

    let mut info = Vec::new();
    bytes_field(1, name.as_bytes(), &mut info);
    bytes_field(2, &type_proto, &mut info);
    info
}

/// A model whose single output is its `1x3xSxS` float input, unchanged
pub fn identity_model(size: u64) -> Vec<u8> {
    let shape = [1, 3, size, size];

    let mut node = Vec::new();
    bytes_field(1, b"input", &mut node);
    bytes_field(2, b"output", &mut node);
    bytes_field(3, b"identity", &mut node);
    bytes_field(4, b"Identity", &mut node);

    let mut graph = Vec::new();
    bytes_field(1, &node, &mut graph);
    bytes_field(2, b"identity_graph", &mut graph);
    bytes_field(11, &value_info("input", &shape), &mut graph);
    bytes_field(12, &value_info("output", &shape), &mut graph);

    let mut opset = Vec::new();
    bytes_field(1, b"", &mut opset);
    varint_field(2, OPSET_VERSION, &mut opset);

    let mut model = Vec::new();
    varint_field(1, IR_VERSION, &mut model);
    bytes_field(7, &graph, &mut model);
    bytes_field(8, &opset, &mut model);
    model
}
