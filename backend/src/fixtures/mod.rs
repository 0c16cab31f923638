//! Demo catalogue shown to new sessions and optionally seeded into the store.

use chrono::{Duration, Utc};

use crate::db::UserDatabase;
use crate::errors::AppError;
use crate::models::{Comment, NewStory, NewUser, Story, StoryStatus};

struct DemoStory {
    id: &'static str,
    author: usize,
    title: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    content: &'static str,
    days_ago: i64,
}

const AUTHORS: [(&str, &str, &str); 3] = [
    ("demo-maya", "Maya Chen", "Short fiction and the occasional essay."),
    ("demo-jonas", "Jonas Berg", "Travel notes from slow trains."),
    ("demo-ines", "Ines Duarte", "Poetry, mostly about the sea."),
];

const STORIES: [DemoStory; 4] = [
    DemoStory {
        id: "demo-story-lighthouse",
        author: 0,
        title: "The Lighthouse Keeper's Daughter",
        category: "Fiction",
        tags: &["fiction", "coast", "family"],
        content: "Every evening she climbed the hundred and twelve steps to light the lamp. \
                  Her father had stopped counting them years ago, but she never did. \
                  The night the ship came too close she was on step ninety.",
        days_ago: 2,
    },
    DemoStory {
        id: "demo-story-night-train",
        author: 1,
        title: "Night Train to Narvik",
        category: "Travel",
        tags: &["travel", "trains", "norway"],
        content: "The sleeper carriage smelled of coffee and wet wool. Outside the window the \
                  forest gave way to snow, then to nothing at all, and somewhere past midnight \
                  the conductor announced we had crossed the Arctic Circle.",
        days_ago: 5,
    },
    DemoStory {
        id: "demo-story-tides",
        author: 2,
        title: "Tides",
        category: "Poetry",
        tags: &["poetry", "sea"],
        content: "The water keeps its own calendar, \
                  two mornings and two evenings every day, \
                  and never once asks what we planned.",
        days_ago: 9,
    },
    DemoStory {
        id: "demo-story-second-draft",
        author: 0,
        title: "On Writing the Second Draft",
        category: "Essay",
        tags: &["writing", "craft"],
        content: "The first draft tells you what the story is about. The second draft is where \
                  you find out whether you were right.",
        days_ago: 14,
    },
];

const COMMENTS: [(&str, &str, usize, &str); 3] = [
    ("demo-comment-1", "demo-story-lighthouse", 1, "Step ninety. I read it twice."),
    ("demo-comment-2", "demo-story-night-train", 2, "Now I want to book this trip."),
    ("demo-comment-3", "demo-story-tides", 0, "Short and perfect."),
];

/// Published demo stories, newest first.
pub fn demo_stories() -> Vec<Story> {
    let now = Utc::now();
    STORIES
        .iter()
        .map(|demo| {
            let (author_id, author_name, _) = AUTHORS[demo.author];
            let new = NewStory {
                id: Some(demo.id.to_string()),
                title: demo.title.to_string(),
                content: demo.content.to_string(),
                excerpt: None,
                author_name: Some(author_name.to_string()),
                category: demo.category.to_string(),
                tags: demo.tags.iter().map(|t| t.to_string()).collect(),
                status: Some(StoryStatus::Published),
            };
            Story::compose(author_id, &new, now - Duration::days(demo.days_ago))
        })
        .collect()
}

pub fn demo_comments() -> Vec<Comment> {
    let now = Utc::now();
    COMMENTS
        .iter()
        .enumerate()
        .map(|(i, (id, story_id, author, content))| {
            let (author_id, author_name, _) = AUTHORS[*author];
            Comment {
                id: id.to_string(),
                story_id: story_id.to_string(),
                author_id: author_id.to_string(),
                author_name: Some(author_name.to_string()),
                content: content.to_string(),
                created_at: now - Duration::hours(i as i64 + 1),
                likes: 0,
            }
        })
        .collect()
}

/// Store the demo authors and their stories. Returns the number of stories added; running it
/// again adds nothing.
pub async fn seed_demo(db: &UserDatabase) -> Result<usize, AppError> {
    for (id, name, bio) in AUTHORS {
        let seed = NewUser {
            name: name.to_string(),
            email: format!("{}@example.com", id),
            bio: bio.to_string(),
            avatar: None,
        };
        db.initialize_user(id, &seed).await?;
    }

    let mut added = 0;
    for story in demo_stories() {
        if db.get_user_story(&story.author_id, &story.id).await?.is_some() {
            continue;
        }
        db.add_user_story(&story.author_id, &NewStory::from(&story))
            .await?;
        added += 1;
    }

    tracing::info!(added, "Seeded demo catalogue");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_data_is_consistent() {
        let stories = demo_stories();
        assert_eq!(stories.len(), STORIES.len());
        assert!(stories.iter().all(|s| s.is_published()));

        assert!(stories
            .iter()
            .all(|s| AUTHORS.iter().any(|(id, _, _)| *id == s.author_id)));
        assert!(demo_comments()
            .iter()
            .all(|c| stories.iter().any(|s| s.id == c.story_id)));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = UserDatabase::in_memory();
        assert_eq!(seed_demo(&db).await.unwrap(), STORIES.len());
        assert_eq!(seed_demo(&db).await.unwrap(), 0);

        assert_eq!(db.get_global_data().await.unwrap().total_users, AUTHORS.len());
        assert_eq!(db.all_stories().await.unwrap().len(), STORIES.len());
        let maya = db.get_user_profile("demo-maya").await.unwrap().unwrap();
        assert_eq!(maya.stats.stories_published, 2);
    }
}
