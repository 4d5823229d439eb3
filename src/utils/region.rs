//! 行政区划
//!
//! 区划编码按 2/4/6/9 位逐级截取：省、市、区县、乡镇。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::CoreResult;

const SPLIT_POINTS: [usize; 4] = [2, 4, 6, 9];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Region>,
}

/// 从 JSON 文件加载区划树
pub fn load_regions(path: impl AsRef<Path>) -> CoreResult<Vec<Region>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// 拆分出各级编码，如 `110101` 得到 `11`、`1101`、`110101`
pub fn parse_area_code(code: &str) -> Vec<&str> {
    SPLIT_POINTS
        .iter()
        .filter_map(|p| code.get(..*p))
        .collect()
}

/// 查找编码对应区域的下级，编码不存在时返回空
pub fn find_children_by_code<'a>(regions: &'a [Region], code: &str) -> &'a [Region] {
    let mut current = regions;
    for part in parse_area_code(code) {
        match current.iter().find(|r| r.code == part) {
            Some(region) => current = &region.children,
            None => return &[],
        }
    }
    current
}

pub fn region_names(regions: &[Region]) -> Vec<String> {
    regions.iter().map(|r| r.name.clone()).collect()
}

pub fn region_codes(regions: &[Region]) -> Vec<String> {
    regions.iter().map(|r| r.code.clone()).collect()
}

pub fn child_names_by_code(code: &str, regions: &[Region]) -> Vec<String> {
    region_names(find_children_by_code(regions, code))
}

pub fn child_codes_by_code(code: &str, regions: &[Region]) -> Vec<String> {
    region_codes(find_children_by_code(regions, code))
}
