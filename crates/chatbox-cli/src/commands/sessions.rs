use anyhow::{Context, Result};
use chatbox_application::ChatStore;
use chatbox_core::session::{SessionPatch, SessionType};
use chatbox_infrastructure::StoreConfig;

pub enum Action {
    List,
    New { name: String, session_type: SessionType },
    Switch(String),
    Copy(String),
    Star(String),
    Rename { id: String, name: String },
    Remove(String),
}

pub async fn run(config: &StoreConfig, action: Action) -> Result<()> {
    let store = ChatStore::open(config).await.context("Failed to open store")?;
    let actions = store.actions();

    match action {
        Action::List => list(&store),
        Action::New { name, session_type } => {
            let session = actions.create(session_type, name).await?;
            println!("Created {}", session.id);
        }
        Action::Switch(id) => {
            actions.switch_current_session(&id).await?;
            println!("Current session: {}", id);
        }
        Action::Copy(id) => {
            let source = store
                .bridge()
                .session(&id)
                .with_context(|| format!("No session with id {}", id))?;
            let copy = actions.copy(&source).await?;
            println!("Copied to {} ({})", copy.id, copy.name);
        }
        Action::Star(id) => {
            let starred = actions.toggle_star(&id).await?;
            println!("{} {}", if starred { "Starred" } else { "Unstarred" }, id);
        }
        Action::Rename { id, name } => {
            let session = actions.save(SessionPatch::new(&id).name(name)).await?;
            println!("Renamed {} to {}", session.id, session.name);
        }
        Action::Remove(id) => {
            let removed = actions.remove(&id).await?;
            println!("Removed {} ({})", removed.id, removed.name);
        }
    }

    store.close().await?;
    Ok(())
}

fn list(store: &ChatStore) {
    let snapshot = store.bridge().snapshot();
    if snapshot.sessions.is_empty() {
        println!("No sessions");
        return;
    }

    for session in &snapshot.sessions {
        let current = snapshot.current_session_id.as_deref() == Some(session.id.as_str());
        println!(
            "{} {} {:<36}  {:<7}  {:>4} msgs  {}",
            if current { ">" } else { " " },
            if session.starred { "*" } else { " " },
            session.id,
            session.session_type.as_str(),
            session.messages.len(),
            session.name
        );
    }
}
