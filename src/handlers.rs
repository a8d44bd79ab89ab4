use crate::dao::{LinkStore, StoreError, LIST_LIMIT};
use crate::interaction::{Interaction, Responded};
use crate::model::{
    Caller, Capability, Command, Invocation, ListingEntry, NewLink, NoticeReason, Reply, ReplyBody,
};
use crate::utils::{is_valid_url, normalize_tag_filter, normalize_tags};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Entries shown in a single listing, out of the up to `LIST_LIMIT` fetched.
pub const LISTING_SIZE: usize = 10;
const NO_TAGS_PLACEHOLDER: &str = "-";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("no links found")]
    NoResults,
    #[error("no link with id {0}")]
    NotFound(i64),
    #[error("caller {caller_id} may not remove link {id}")]
    PermissionDenied { id: i64, caller_id: i64 },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CommandError {
    pub fn into_reply(self) -> Reply {
        match self {
            CommandError::InvalidUrl(_) => Reply::public(notice(
                NoticeReason::InvalidUrl,
                "Invalid URL. Use a format like `https://example.com` or `example.com`.".to_string(),
            )),
            CommandError::NoResults => {
                Reply::ephemeral(notice(NoticeReason::NoResults, "No links found.".to_string()))
            }
            CommandError::NotFound(id) => Reply::ephemeral(notice(
                NoticeReason::NotFound,
                format!("No link found with ID `{id}`."),
            )),
            CommandError::PermissionDenied { .. } => Reply::ephemeral(notice(
                NoticeReason::PermissionDenied,
                "You are not allowed to remove this link. Only the member who added it or a moderator can remove it."
                    .to_string(),
            )),
            CommandError::Storage(_) => Reply::ephemeral(notice(
                NoticeReason::Failure,
                "Something went wrong while reaching the link store. Please try again.".to_string(),
            )),
        }
    }
}

fn notice(reason: NoticeReason, message: String) -> ReplyBody {
    ReplyBody::Notice { reason, message }
}

/// Runs one invocation to completion: acknowledge, execute, reply once.
pub async fn dispatch(
    store: Arc<dyn LinkStore>,
    invocation: Invocation,
    interaction: Interaction,
) -> Responded {
    let acknowledged = interaction.acknowledge();
    let Invocation { caller, command } = invocation;
    let command_name = command.name();

    let reply = match execute(store.as_ref(), &caller, command).await {
        Ok(reply) => reply,
        Err(CommandError::Storage(err)) => {
            tracing::error!(
                interaction_id = acknowledged.id(),
                command = command_name,
                "Link store failure: {}",
                err
            );
            CommandError::Storage(err).into_reply()
        }
        Err(err) => {
            tracing::debug!(
                interaction_id = acknowledged.id(),
                command = command_name,
                "Invocation rejected: {}",
                err
            );
            err.into_reply()
        }
    };
    acknowledged.respond(reply).await
}

pub async fn execute(
    store: &dyn LinkStore,
    caller: &Caller,
    command: Command,
) -> Result<Reply, CommandError> {
    match command {
        Command::Save { url, title, tags } => save(store, caller, &url, title, tags).await,
        Command::List { tag } => list(store, tag.as_deref()).await,
        Command::Get { id } => get(store, id).await,
        Command::Remove { id } => remove(store, caller.id, caller.capability, id).await,
    }
}

pub async fn save(
    store: &dyn LinkStore,
    caller: &Caller,
    url: &str,
    title: Option<String>,
    tags: Option<String>,
) -> Result<Reply, CommandError> {
    let url = url.trim();
    if !is_valid_url(url) {
        return Err(CommandError::InvalidUrl(url.to_string()));
    }
    let new_link = NewLink {
        url: url.to_string(),
        title: title.filter(|title| !title.trim().is_empty()),
        tags: tags.as_deref().and_then(normalize_tags),
        added_by_id: caller.id,
        added_by_name: caller.name.clone(),
        added_at: Utc::now(),
    };
    let id = store.create(&new_link).await?;
    tracing::info!(link_id = id, caller_id = caller.id, "Link saved");

    Ok(Reply::public(ReplyBody::Saved {
        id,
        label: new_link.title.unwrap_or_else(|| new_link.url.clone()),
        url: new_link.url,
        tags: new_link.tags,
        added_by_name: new_link.added_by_name,
    }))
}

pub async fn list(store: &dyn LinkStore, tag: Option<&str>) -> Result<Reply, CommandError> {
    let tag_filter = tag.and_then(normalize_tag_filter);
    let links = store.list(tag_filter.as_deref(), LIST_LIMIT).await?;
    if links.is_empty() {
        return Err(CommandError::NoResults);
    }

    let entries: Vec<ListingEntry> = links.iter().take(LISTING_SIZE).map(ListingEntry::from).collect();
    let shown = entries.len();
    let total = links.len();
    Ok(Reply::public(ReplyBody::Listing {
        entries,
        shown,
        total,
        summary: format!(
            "Showing {shown} of {total} results. Use `/link get <id>` for full details."
        ),
    }))
}

pub async fn get(store: &dyn LinkStore, id: i64) -> Result<Reply, CommandError> {
    let link = store.get(id).await?.ok_or(CommandError::NotFound(id))?;
    Ok(Reply::public(ReplyBody::Detail {
        id: link.id,
        label: link.label().to_string(),
        tags: link
            .tags
            .clone()
            .unwrap_or_else(|| NO_TAGS_PLACEHOLDER.to_string()),
        added_by_name: link.added_by_name.clone(),
        added_at: link.added_at,
        hint: format!(
            "Use `/link remove {id}` to delete it if you added it or are a moderator."
        ),
        url: link.url,
    }))
}

pub async fn remove(
    store: &dyn LinkStore,
    caller_id: i64,
    capability: Capability,
    id: i64,
) -> Result<Reply, CommandError> {
    let link = store.get(id).await?.ok_or(CommandError::NotFound(id))?;
    if link.added_by_id != caller_id && capability != Capability::Moderator {
        return Err(CommandError::PermissionDenied { id, caller_id });
    }

    // Gone in between the lookup and the delete: someone else removed it.
    let removed = store.delete(id).await?.ok_or(CommandError::NotFound(id))?;
    tracing::info!(link_id = id, caller_id, "Link removed");

    let label = removed.label().to_string();
    Ok(Reply::public(ReplyBody::Removed {
        id,
        message: format!("Link ID `{id}` removed. ({label})"),
        label,
    }))
}
