use flowcore::Position;

const X_ORIGIN: i64 = 200;
const X_SPAN: i64 = 800;
const Y_ORIGIN: i64 = 100;
const Y_SPAN: i64 = 600;

/// Canvas position derived from a node id.
///
/// Legacy documents carry no layout, so each node lands at a spot picked by
/// a 32-bit rolling hash of its id (UTF-16 units, `h = h * 31 + c` with
/// wrapping). Re-importing the same document reproduces the same layout.
pub fn position_for(node_id: &str) -> Position {
    let hash = node_id.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });

    let x = X_ORIGIN + i64::from(hash).abs() % X_SPAN;
    let y = Y_ORIGIN + i64::from(hash >> 16).abs() % Y_SPAN;

    Position::new(x as f64, y as f64)
}
