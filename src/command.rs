use crate::api::types::{ListKind, SortMode};
use crate::cart::{CartItem, ListOp};
use crate::graph::freshness::FreshScope;
use crate::graph::identity::Identity;
use crate::graph::key::EntityKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect(String),
    Disconnect,
    ToggleTag { list: ListKind, tag: String },
    SetTags { list: ListKind, tags: Vec<String> },
    Sort { list: ListKind, sort: SortMode },
    Search { list: ListKind, text: String },
    More(ListKind),
    Fresh(FreshScope),
    ClearFresh(FreshScope),
    Refetch(EntityKind),
    Recent(Option<String>),
    Stage(CartItem),
    Unstage(CartItem),
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
connect <address|name>      switch the viewer identity
disconnect                  drop the viewer identity
tag <list> <tag>            toggle a tag filter (list: followers|following)
tags <list> [tag ...]       replace the tag filters, none clears them
sort <list> <mode>          followers | latest | earliest
search <list> [text]        filter by name or address, 3+ characters
more <list>                 load the next page
fresh <profile|stats>       bypass backend caches once
fresh clear <profile|stats> withdraw a pending fresh request
refetch <entity>            profile, stats, follower-tags, following-tags,
                            followers, following, top-eight, roles
recent [tag]                show recent tags, or push one to the front
stage <op> <address>        queue a list change (follow, unfollow, block,
                            unblock, mute, unmute, tag:<t>, untag:<t>)
unstage <op> <address>      drop a queued list change
show                        print the current snapshot
quit";

pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.strip_prefix(':').unwrap_or(input).trim();

    if input.is_empty() {
        return None;
    }

    let (cmd, args) = split_word(input);

    match cmd {
        "connect" | "c" if !args.is_empty() => Some(Command::Connect(strip_at(args).to_owned())),
        "disconnect" | "d" => Some(Command::Disconnect),
        "tag" => {
            let (list, tag) = split_word(args);
            let tag = normalize_tag(tag)?;
            Some(Command::ToggleTag {
                list: ListKind::parse(list)?,
                tag,
            })
        }
        "tags" => {
            let (list, rest) = split_word(args);
            Some(Command::SetTags {
                list: ListKind::parse(list)?,
                tags: rest.split_whitespace().filter_map(normalize_tag).collect(),
            })
        }
        "sort" => {
            let (list, mode) = split_word(args);
            Some(Command::Sort {
                list: ListKind::parse(list)?,
                sort: SortMode::parse(mode)?,
            })
        }
        "search" | "s" => {
            let (list, text) = split_word(args);
            Some(Command::Search {
                list: ListKind::parse(list)?,
                text: text.to_owned(),
            })
        }
        "more" | "m" => Some(Command::More(ListKind::parse(args)?)),
        "fresh" => match split_word(args) {
            ("clear", scope) => Some(Command::ClearFresh(FreshScope::parse(scope)?)),
            _ => Some(Command::Fresh(FreshScope::parse(args)?)),
        },
        "refetch" | "r" => Some(Command::Refetch(EntityKind::parse(args)?)),
        "recent" => Some(Command::Recent(normalize_tag(args))),
        "stage" => Some(Command::Stage(parse_item(args)?)),
        "unstage" => Some(Command::Unstage(parse_item(args)?)),
        "show" => Some(Command::Show),
        "help" | "h" => Some(Command::Help),
        "quit" | "q" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn parse_item(args: &str) -> Option<CartItem> {
    let (op, address) = split_word(args);
    let address = Identity::parse(address).ok().filter(Identity::is_address)?;
    Some(CartItem::new(address.as_str(), ListOp::parse(op)?))
}

fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    (!tag.is_empty()).then(|| tag.to_owned())
}

pub fn strip_at(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}
