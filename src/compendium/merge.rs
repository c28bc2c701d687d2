//! 深入研究：把新建的子树挂载到已有知识树上
//!
//! 挂载不改写子树内部存储的地址，地址始终相对解析时给定的根节点求值。

use super::address::{Address, resolve_domain_mut};
use super::error::KnowledgeError;
use super::model::{Compendium, Domain};

/// 把 `subtree` 作为 `parent` 的子领域挂载；给出 `under_child_id` 时挂到该子领域下。
/// 冲突或找不到目标时树保持不变。
pub fn attach(
    parent: &mut Domain,
    subtree: Domain,
    under_child_id: Option<&str>,
) -> Result<(), KnowledgeError> {
    let target = match under_child_id {
        Some(child_id) => {
            let parent_id = parent.id().to_string();
            parent
                .subdomain_mut(child_id)
                .ok_or_else(|| KnowledgeError::UnknownChild {
                    id: child_id.to_string(),
                    parent: parent_id,
                })?
        }
        None => parent,
    };
    target.add_subdomain(subtree)
}

/// 按地址定位父领域后挂载，返回子树根节点的新地址
pub fn attach_at(
    compendium: &mut Compendium,
    parent_address: &Address,
    subtree: Domain,
    under_child_id: Option<&str>,
) -> Result<Address, KnowledgeError> {
    let subtree_id = subtree.id().to_string();
    let parent = resolve_domain_mut(parent_address, compendium.root_mut())?;
    attach(parent, subtree, under_child_id)?;

    let base = match under_child_id {
        Some(child_id) => parent_address.child(child_id),
        None => parent_address.clone(),
    };
    Ok(base.child(&subtree_id))
}
