//! In-band group commands.
//!
//! Text sent to a group is parsed before routing. A recognised command is
//! executed and answered with system notices or a group broadcast; anything
//! else is plain chat and is broadcast unchanged.

use anyhow::Result;
use tracing::{debug, info};

use chatty_types::{Group, SYSTEM_USER_ID, User};

use crate::delivery::{broadcast, notify};
use crate::gateway::Gateway;

pub const HELP: &str = "Admin commands: /add /kick /grant\nCommon commands: /leave /list";

const NOT_MEMBER: &str = "You are not the member of the group";
const NOT_OWNER: &str = "You aren't owner of this group";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    Leave,
    List,
    Add(String),
    Kick(String),
    Grant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupInput {
    Command(GroupCommand),
    PlainText(String),
}

impl GroupInput {
    /// Match `text` against the command prefixes. Targets are trimmed and
    /// may come back empty.
    pub fn parse(text: &str) -> Self {
        let target = |rest: &str| rest.trim().to_string();

        let command = if text.starts_with("/leave") {
            GroupCommand::Leave
        } else if text.starts_with("/list") {
            GroupCommand::List
        } else if let Some(rest) = text.strip_prefix("/add ") {
            GroupCommand::Add(target(rest))
        } else if let Some(rest) = text.strip_prefix("/kick ") {
            GroupCommand::Kick(target(rest))
        } else if let Some(rest) = text.strip_prefix("/grant ") {
            GroupCommand::Grant(target(rest))
        } else {
            return Self::PlainText(text.to_string());
        };
        Self::Command(command)
    }
}

impl GroupCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::List => "list",
            Self::Add(_) => "add",
            Self::Kick(_) => "kick",
            Self::Grant(_) => "grant",
        }
    }
}

/// Route text a user sent to `group`: membership check, then either a
/// command or a broadcast. The system sender skips the membership check.
pub async fn handle_group_input(
    gateway: &Gateway,
    sender: &User,
    group: &Group,
    text: &str,
) -> Result<()> {
    if sender.id != SYSTEM_USER_ID
        && gateway
            .store()
            .find_membership(group.id, sender.id)?
            .is_none()
    {
        notify(gateway, sender.id, group.id, NOT_MEMBER).await;
        return Ok(());
    }

    match GroupInput::parse(text) {
        GroupInput::PlainText(text) => {
            broadcast(gateway, group.id, sender.id, &text).await?;
        }
        GroupInput::Command(command) => {
            run_command(gateway, sender, group.id, command).await?;
        }
    }
    Ok(())
}

async fn run_command(
    gateway: &Gateway,
    sender: &User,
    group_id: u64,
    command: GroupCommand,
) -> Result<()> {
    let _guard = gateway.group_lock(group_id).await;

    // Re-read under the lock: ownership may have moved since routing.
    let Some(group) = gateway.store().find_group_by_id(group_id)? else {
        return Ok(());
    };
    debug!(
        group_id,
        user_id = sender.id,
        "running /{}",
        command.name()
    );

    let sender_id = sender.id;
    let reply = |text: String| {
        let gateway = gateway.clone();
        async move {
            notify(&gateway, sender_id, group_id, &text).await;
        }
    };

    match command {
        GroupCommand::Leave => {
            if group.is_owner(sender.id) {
                reply("You can't leave group without owner, use /grant and then /leave".into())
                    .await;
            } else if gateway.store().remove_member(group_id, sender.id)? {
                info!(group_id, user_id = sender.id, "member left group");
                let text = format!("{} left the group", sender.username);
                broadcast(gateway, group_id, SYSTEM_USER_ID, &text).await?;
            } else {
                reply("You are not in the group".into()).await;
            }
        }

        GroupCommand::List => {
            let list = roster(gateway, &group, true).await?;
            reply(list).await;
        }

        GroupCommand::Add(name) => {
            if !group.is_owner(sender.id) {
                reply(NOT_OWNER.into()).await;
                return Ok(());
            }
            if name.is_empty() {
                reply("Usage: /add <username>".into()).await;
                return Ok(());
            }
            let Some(target) = gateway.store().find_user_by_name(&name)? else {
                reply(format!("{} doesn't exist", name)).await;
                return Ok(());
            };
            if target.id == SYSTEM_USER_ID {
                reply(format!("{} can't be added to a group", target.username)).await;
                return Ok(());
            }
            match gateway
                .store()
                .add_member(group_id, target.id, &target.username)?
            {
                Some(_) => {
                    info!(group_id, user_id = target.id, "member added to group");
                    let text = format!("{} was added to the group", target.username);
                    broadcast(gateway, group_id, SYSTEM_USER_ID, &text).await?;
                }
                None => reply(format!("{} already in group", target.username)).await,
            }
        }

        GroupCommand::Kick(name) => {
            if !group.is_owner(sender.id) {
                reply(NOT_OWNER.into()).await;
                return Ok(());
            }
            if name.is_empty() {
                reply("Usage: /kick <username>".into()).await;
                return Ok(());
            }
            let Some(target) = gateway.store().find_user_by_name(&name)? else {
                reply(format!("{} doesn't exist", name)).await;
                return Ok(());
            };
            if target.id == sender.id {
                reply("You can't delete yourself, use /grant and then /leave".into()).await;
                return Ok(());
            }
            if gateway.store().remove_member(group_id, target.id)? {
                info!(group_id, user_id = target.id, "member kicked from group");
                let text = format!("{} was deleted from the group", target.username);
                broadcast(gateway, group_id, SYSTEM_USER_ID, &text).await?;
            } else {
                reply(format!("{} not in group", target.username)).await;
            }
        }

        GroupCommand::Grant(name) => {
            if !group.is_owner(sender.id) {
                reply(NOT_OWNER.into()).await;
                return Ok(());
            }
            if name.is_empty() {
                reply("Usage: /grant <username>".into()).await;
                return Ok(());
            }
            let Some(target) = gateway.store().find_user_by_name(&name)? else {
                reply(format!("{} doesn't exist", name)).await;
                return Ok(());
            };
            if target.id == sender.id {
                reply("You can't /grant to yourself".into()).await;
                return Ok(());
            }
            if gateway
                .store()
                .find_membership(group_id, target.id)?
                .is_none()
            {
                reply(format!("{} not in group", target.username)).await;
                return Ok(());
            }
            if gateway.store().update_group_owner(group_id, target.id)? {
                info!(group_id, owner_id = target.id, "group ownership transferred");
                let text = format!("{} is now owner of the group", target.username);
                broadcast(gateway, group_id, SYSTEM_USER_ID, &text).await?;
            }
        }
    }
    Ok(())
}

/// Numbered member list with a presence glyph per member, optionally
/// marking the owner.
pub async fn roster(gateway: &Gateway, group: &Group, mark_owner: bool) -> Result<String> {
    let members = gateway.store().list_group_members(group.id)?;

    let mut list = String::from("List of users in group");
    for (i, member) in members.iter().enumerate() {
        let glyph = if gateway.presence().is_online(member.user_id).await {
            "🔵"
        } else {
            "🌑"
        };
        list.push_str(&format!("\n{}.  {} {}", i + 1, glyph, member.username));
        if mark_owner && group.is_owner(member.user_id) {
            list.push_str(" 👑");
        }
    }
    Ok(list)
}

/// Help text and roster for one group, sent as a notice to `user_id`.
pub async fn send_group_hello(gateway: &Gateway, user_id: u64, group: &Group) -> Result<()> {
    let text = format!("{}\n{}", HELP, roster(gateway, group, false).await?);
    notify(gateway, user_id, group.id, &text).await;
    Ok(())
}

/// Hello notices for every group `user_id` belongs to.
pub async fn send_hello(gateway: &Gateway, user_id: u64) -> Result<()> {
    let groups = gateway.store().list_groups_for_user(user_id)?;
    for group in &groups {
        send_group_hello(gateway, user_id, group).await?;
    }
    debug!(user_id, groups = groups.len(), "sent hello");
    Ok(())
}
