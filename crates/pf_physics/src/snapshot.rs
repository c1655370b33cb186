// crates/pf_physics/src/snapshot.rs

//! 快照编码
//!
//! 纯内存编码：引擎自身不读写文件，持久化由外部协作方完成。
//!
//! - 宏观视图与颗粒视图编码为小端 float32 原始数组，
//!   前置小头部描述网格尺寸与场顺序
//! - 单元标记掩码位级精确编码/恢复
//!
//! 头部布局（小端）：
//! ```text
//! magic: u32 ("PFSP") | version: u16 | kind: u16
//! nx: u32 | ny: u32 | nz: u32 | field_count: u32
//! 每场: name_len: u8 + ASCII 名称
//! 随后: 各场 f32 数组按声明顺序连续存放
//! ```

use pf_lattice::fields::MacroView;
use pf_lattice::grid::GridDims;
use pf_lattice::tags::CellTag;

use crate::particles::ParticleView;

/// 快照魔数
pub const SNAPSHOT_MAGIC: u32 = 0x5046_5350; // "PFSP"
/// 格式版本
pub const SNAPSHOT_VERSION: u16 = 1;

/// 快照类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SnapshotKind {
    /// 宏观场
    Macro = 1,
    /// 颗粒
    Particles = 2,
    /// 标记掩码
    Mask = 3,
}

fn write_header(out: &mut Vec<u8>, kind: SnapshotKind, dims: (u32, u32, u32), fields: &[&str]) {
    out.extend_from_slice(&SNAPSHOT_MAGIC.to_le_bytes());
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    out.extend_from_slice(&(kind as u16).to_le_bytes());
    out.extend_from_slice(&dims.0.to_le_bytes());
    out.extend_from_slice(&dims.1.to_le_bytes());
    out.extend_from_slice(&dims.2.to_le_bytes());
    out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
    for name in fields {
        debug_assert!(name.len() <= u8::MAX as usize && name.is_ascii());
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
    }
}

fn write_f32_field(out: &mut Vec<u8>, values: impl Iterator<Item = f64>) {
    for v in values {
        out.extend_from_slice(&(v as f32).to_le_bytes());
    }
}

/// 编码宏观场视图
///
/// 场顺序：rho, ux, uy, uz, p, phi, temperature, nu_sgs。
pub fn encode_macro(view: &MacroView<'_>) -> Vec<u8> {
    let dims = view.dims;
    let n = dims.n_cells();
    let fields = [
        "rho",
        "ux",
        "uy",
        "uz",
        "p",
        "phi",
        "temperature",
        "nu_sgs",
    ];
    let mut out = Vec::with_capacity(64 + fields.len() * n * 4);
    write_header(
        &mut out,
        SnapshotKind::Macro,
        (dims.nx as u32, dims.ny as u32, dims.nz as u32),
        &fields,
    );

    write_f32_field(&mut out, view.rho.iter().copied());
    write_f32_field(&mut out, view.ux.iter().copied());
    write_f32_field(&mut out, view.uy.iter().copied());
    write_f32_field(&mut out, view.uz.iter().copied());
    write_f32_field(&mut out, (0..n).map(|c| view.pressure(c)));
    write_f32_field(&mut out, view.phi.iter().copied());
    write_f32_field(&mut out, view.temperature.iter().copied());
    write_f32_field(&mut out, view.nu_sgs.iter().copied());
    out
}

/// 编码颗粒视图
///
/// 场顺序：x, y, z, vx, vy, vz, radius, active。
/// active 以 0/1 的 f32 编码，保持单一数组格式。
pub fn encode_particles(view: &ParticleView<'_>) -> Vec<u8> {
    let fields = ["x", "y", "z", "vx", "vy", "vz", "radius", "active"];
    let n = view.count;
    let mut out = Vec::with_capacity(64 + fields.len() * n * 4);
    write_header(
        &mut out,
        SnapshotKind::Particles,
        (n as u32, 1, 1),
        &fields,
    );

    write_f32_field(&mut out, view.x.iter().copied());
    write_f32_field(&mut out, view.y.iter().copied());
    write_f32_field(&mut out, view.z.iter().copied());
    write_f32_field(&mut out, view.vx.iter().copied());
    write_f32_field(&mut out, view.vy.iter().copied());
    write_f32_field(&mut out, view.vz.iter().copied());
    write_f32_field(&mut out, view.radius.iter().copied());
    write_f32_field(
        &mut out,
        view.active.iter().map(|&a| if a { 1.0 } else { 0.0 }),
    );
    out
}

/// 编码标记掩码（位级精确）
pub fn encode_mask(dims: GridDims, mask: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + mask.len());
    write_header(
        &mut out,
        SnapshotKind::Mask,
        (dims.nx as u32, dims.ny as u32, dims.nz as u32),
        &["tags"],
    );
    out.extend_from_slice(mask);
    out
}

/// 解码标记掩码
///
/// 校验魔数、版本、类别、尺寸与标记值域；任何不符返回 None。
pub fn decode_mask(bytes: &[u8]) -> Option<(GridDims, Vec<u8>)> {
    let mut cursor = 0usize;
    let read_u32 = |bytes: &[u8], cursor: &mut usize| -> Option<u32> {
        let v = u32::from_le_bytes(bytes.get(*cursor..*cursor + 4)?.try_into().ok()?);
        *cursor += 4;
        Some(v)
    };
    let read_u16 = |bytes: &[u8], cursor: &mut usize| -> Option<u16> {
        let v = u16::from_le_bytes(bytes.get(*cursor..*cursor + 2)?.try_into().ok()?);
        *cursor += 2;
        Some(v)
    };

    if read_u32(bytes, &mut cursor)? != SNAPSHOT_MAGIC {
        return None;
    }
    if read_u16(bytes, &mut cursor)? != SNAPSHOT_VERSION {
        return None;
    }
    if read_u16(bytes, &mut cursor)? != SnapshotKind::Mask as u16 {
        return None;
    }
    let nx = read_u32(bytes, &mut cursor)? as usize;
    let ny = read_u32(bytes, &mut cursor)? as usize;
    let nz = read_u32(bytes, &mut cursor)? as usize;
    let field_count = read_u32(bytes, &mut cursor)?;
    if field_count != 1 {
        return None;
    }
    let name_len = *bytes.get(cursor)? as usize;
    cursor += 1 + name_len;

    let dims = GridDims::new(nx, ny, nz);
    let data = bytes.get(cursor..)?;
    if data.len() != dims.n_cells() {
        return None;
    }
    if data.iter().any(|&b| CellTag::from_u8(b).is_none()) {
        return None;
    }
    Some((dims, data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_lattice::fields::MacroFields;

    #[test]
    fn test_macro_snapshot_layout() {
        let dims = GridDims::new(4, 3, 2);
        let mut macros = MacroFields::new(dims);
        macros.rho.fill(1.5);
        macros.ux[0] = 0.25;

        let bytes = encode_macro(&macros.view());

        // 魔数与尺寸
        assert_eq!(&bytes[0..4], &SNAPSHOT_MAGIC.to_le_bytes());
        let nx = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(nx, 4);

        // 头部之后第一个场是 rho
        let header_len = 8 + 12 + 4
            + ["rho", "ux", "uy", "uz", "p", "phi", "temperature", "nu_sgs"]
                .iter()
                .map(|s| 1 + s.len())
                .sum::<usize>();
        let rho0 = f32::from_le_bytes(bytes[header_len..header_len + 4].try_into().unwrap());
        assert_eq!(rho0, 1.5f32);

        // 总长 = 头部 + 8 场 × n × 4 字节
        assert_eq!(bytes.len(), header_len + 8 * dims.n_cells() * 4);
    }

    #[test]
    fn test_mask_round_trip_bit_exact() {
        let dims = GridDims::new(5, 4, 3);
        let mut mask = vec![0u8; dims.n_cells()];
        mask[3] = CellTag::Solid.as_u8();
        mask[17] = CellTag::Porous.as_u8();
        mask[40] = CellTag::Outlet.as_u8();
        mask[59] = CellTag::Interface.as_u8();

        let bytes = encode_mask(dims, &mask);
        let (dims2, mask2) = decode_mask(&bytes).unwrap();
        assert_eq!(dims2, dims);
        assert_eq!(mask2, mask);
    }

    #[test]
    fn test_mask_decode_rejects_corruption() {
        let dims = GridDims::new(3, 3, 3);
        let mask = vec![0u8; dims.n_cells()];
        let mut bytes = encode_mask(dims, &mask);

        // 魔数破坏
        let mut bad = bytes.clone();
        bad[0] ^= 0xFF;
        assert!(decode_mask(&bad).is_none());

        // 非法标记值
        let last = bytes.len() - 1;
        bytes[last] = 200;
        assert!(decode_mask(&bytes).is_none());

        // 截断
        assert!(decode_mask(&bytes[..bytes.len() - 2]).is_none());
    }

    #[test]
    fn test_particle_snapshot() {
        use crate::config::ParticleConfig;
        use crate::particles::ParticleSystem;
        let dims = GridDims::new(8, 8, 8);
        let mut sys = ParticleSystem::new(
            dims,
            ParticleConfig {
                capacity: 4,
                ..Default::default()
            },
        );
        sys.pool.x[0] = 1.25;
        sys.pool.active[0] = true;
        sys.pool.count = 1;

        let bytes = encode_particles(&sys.view());
        // kind 字段为 Particles
        let kind = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
        assert_eq!(kind, SnapshotKind::Particles as u16);
        // count 写在 nx 槽位
        let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(count, 1);
    }
}
