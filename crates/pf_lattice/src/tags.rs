// crates/pf_lattice/src/tags.rs

//! 单元标记
//!
//! 每个单元携带一个标记，决定其在碰撞、流动与边界处理中的角色。
//! 使用 `repr(u8)` 以支持掩码的位级精确保存与恢复。

use serde::{Deserialize, Serialize};

/// 单元标记枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum CellTag {
    /// 自由流体单元
    #[default]
    Fluid = 0,

    /// 固体单元（半步反弹）
    Solid = 1,

    /// 多孔介质单元（Darcy-Forchheimer 阻力）
    Porous = 2,

    /// 入流单元（Zou-He 速度入口）
    Inlet = 3,

    /// 出流单元（二阶外推 + 压力修正）
    Outlet = 4,

    /// 界面厚度带单元
    ///
    /// 仅作标记用途；物理上按普通流体处理，表面张力由体积力承担。
    Interface = 5,
}

impl CellTag {
    /// 是否参与碰撞与宏观量恢复
    ///
    /// 固体单元的分布函数只作反弹镜像，不参与碰撞。
    #[inline]
    pub fn collides(&self) -> bool {
        !matches!(self, Self::Solid)
    }

    /// 是否为流体类单元（流体 / 多孔 / 界面带）
    #[inline]
    pub fn is_fluid_like(&self) -> bool {
        matches!(self, Self::Fluid | Self::Porous | Self::Interface)
    }

    /// 是否为固体
    #[inline]
    pub fn is_solid(&self) -> bool {
        matches!(self, Self::Solid)
    }

    /// 是否为多孔介质
    #[inline]
    pub fn is_porous(&self) -> bool {
        matches!(self, Self::Porous)
    }

    /// 是否为开边界（入流或出流）
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Inlet | Self::Outlet)
    }

    /// 从 u8 值转换（掩码恢复）
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Fluid),
            1 => Some(Self::Solid),
            2 => Some(Self::Porous),
            3 => Some(Self::Inlet),
            4 => Some(Self::Outlet),
            5 => Some(Self::Interface),
            _ => None,
        }
    }

    /// 转换为 u8 值（掩码保存）
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for CellTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fluid => "Fluid",
            Self::Solid => "Solid",
            Self::Porous => "Porous",
            Self::Inlet => "Inlet",
            Self::Outlet => "Outlet",
            Self::Interface => "Interface",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_tags() {
        for v in 0u8..=5 {
            let tag = CellTag::from_u8(v).unwrap();
            assert_eq!(tag.as_u8(), v);
        }
        assert_eq!(CellTag::from_u8(6), None);
        assert_eq!(CellTag::from_u8(255), None);
    }

    #[test]
    fn test_predicates() {
        assert!(CellTag::Fluid.collides());
        assert!(!CellTag::Solid.collides());
        assert!(CellTag::Porous.is_fluid_like());
        assert!(CellTag::Interface.is_fluid_like());
        assert!(!CellTag::Inlet.is_fluid_like());
        assert!(CellTag::Inlet.is_open());
        assert!(CellTag::Outlet.is_open());
        assert!(!CellTag::Porous.is_open());
    }
}
