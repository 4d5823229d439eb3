//! 切片工具，结果均保持输入顺序

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;

/// 去重，保留首次出现的位置
pub fn unique<T: Eq + Hash + Clone>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

/// 差集：在 `base` 中但不在任一 `others` 中
pub fn diff<T: Eq + Hash + Clone>(base: &[T], others: &[&[T]]) -> Vec<T> {
    let exclude: HashSet<&T> = others.iter().flat_map(|s| s.iter()).collect();
    base.iter()
        .filter(|item| !exclude.contains(item))
        .cloned()
        .collect()
}

/// 交集，按第一个切片的顺序输出且不重复
pub fn intersect<T: Eq + Hash + Clone>(slices: &[&[T]]) -> Vec<T> {
    let Some((first, rest)) = slices.split_first() else {
        return Vec::new();
    };
    let sets: Vec<HashSet<&T>> = rest.iter().map(|s| s.iter().collect()).collect();
    let mut seen = HashSet::new();
    first
        .iter()
        .filter(|item| sets.iter().all(|set| set.contains(item)) && seen.insert(*item))
        .cloned()
        .collect()
}

pub fn index_of<T: PartialEq>(items: &[T], item: &T) -> Option<usize> {
    items.iter().position(|v| v == item)
}

/// 移除所有相等的元素
pub fn remove_all<T: PartialEq>(items: &mut Vec<T>, item: &T) {
    items.retain(|v| v != item);
}

/// 按 key 转为字典，key 重复时后者覆盖前者
pub fn to_map_by<T, K, F>(items: Vec<T>, key: F) -> HashMap<K, T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    items.into_iter().map(|item| (key(&item), item)).collect()
}

/// 字符串转数字，无法解析的项为默认值
pub fn parse_all<T: FromStr + Default, S: AsRef<str>>(items: &[S]) -> Vec<T> {
    items
        .iter()
        .map(|s| s.as_ref().trim().parse().unwrap_or_default())
        .collect()
}

pub fn to_strings<T: Display>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}
