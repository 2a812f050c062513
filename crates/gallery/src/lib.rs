use anyhow::{Context, Result};
use collage::{CollageSettings, Grid, OwnedAsset};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("fuser")
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("gallery.db")
}

/// A collage saved to the user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCollage {
    pub id: String,
    pub owner_id: String,
    pub grid: Grid,
    pub settings: CollageSettings,
    pub result_url: Option<String>,
    pub hidden: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletHoldings {
    pub wallet: String,
    pub assets: Vec<OwnedAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HerdMember {
    pub asset_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Herd {
    pub id: String,
    pub owner: String,
    pub tier: i64,
    pub rarity: i64,
    pub members: Vec<HerdMember>,
}

pub struct GalleryDb {
    conn: Connection,
    path: Option<PathBuf>,
}

impl GalleryDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening gallery db {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        apply_migrations(&conn)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ---- collages -------------------------------------------------------

    pub fn save_collage(
        &self,
        owner_id: &str,
        grid: &Grid,
        settings: &CollageSettings,
        result_url: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO collages(id, owner_id, grid_json, settings_json, result_url, hidden, created_at, updated_at) VALUES(?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
            params![
                id,
                owner_id,
                serde_json::to_string(grid)?,
                serde_json::to_string(settings)?,
                result_url,
                now
            ],
        )?;
        info!(%id, owner_id, "collage saved");
        Ok(id)
    }

    pub fn load_collage(&self, id: &str) -> Result<Option<SavedCollage>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, owner_id, grid_json, settings_json, result_url, hidden, created_at FROM collages WHERE id = ?1",
                params![id],
                CollageRow::from_row,
            )
            .optional()?;
        raw.map(CollageRow::decode).transpose()
    }

    /// Collages on an owner's profile. Hidden ones are only listed for the
    /// owner themself.
    pub fn collages_for(&self, owner_id: &str, is_owner: bool) -> Result<Vec<SavedCollage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, grid_json, settings_json, result_url, hidden, created_at FROM collages \
             WHERE owner_id = ?1 AND (?2 OR hidden = 0) ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![owner_id, is_owner], CollageRow::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    /// Returns false when no collage has that id.
    pub fn set_collage_hidden(&self, id: &str, hidden: bool) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE collages SET hidden = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, hidden, now],
        )?;
        debug!(id, hidden, changed, "collage visibility");
        Ok(changed > 0)
    }

    // ---- owned assets ---------------------------------------------------

    pub fn add_owned_asset(&self, wallet: &str, asset: &OwnedAsset) -> Result<()> {
        self.conn.execute(
            "INSERT INTO owned_assets(wallet, asset_id, name, motion_url, profile_url, motion_tag) VALUES(?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(wallet, asset_id) DO UPDATE SET name = excluded.name, motion_url = excluded.motion_url, \
             profile_url = excluded.profile_url, motion_tag = excluded.motion_tag",
            params![
                wallet,
                asset.asset_id,
                asset.name,
                asset.motion_url,
                asset.profile_url,
                asset.motion_tag
            ],
        )?;
        Ok(())
    }

    /// Assets held by each wallet, in the order the wallets were given.
    /// Wallets holding nothing are left out.
    pub fn owned_assets(&self, wallets: &[&str]) -> Result<Vec<WalletHoldings>> {
        let mut stmt = self.conn.prepare(
            "SELECT asset_id, name, motion_url, profile_url, motion_tag FROM owned_assets WHERE wallet = ?1 ORDER BY name ASC",
        )?;
        let mut out = Vec::new();
        for wallet in wallets {
            let rows = stmt.query_map(params![wallet], |row| {
                Ok(OwnedAsset {
                    asset_id: row.get(0)?,
                    name: row.get(1)?,
                    motion_url: row.get(2)?,
                    profile_url: row.get(3)?,
                    motion_tag: row.get(4)?,
                })
            })?;
            let assets = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            if !assets.is_empty() {
                out.push(WalletHoldings {
                    wallet: wallet.to_string(),
                    assets,
                });
            }
        }
        Ok(out)
    }

    // ---- herds ----------------------------------------------------------

    pub fn upsert_herd(&self, herd: &Herd) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let now = chrono::Utc::now().timestamp();
        tx.execute(
            "INSERT INTO herds(id, owner, tier, rarity, updated_at) VALUES(?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(id) DO UPDATE SET owner = excluded.owner, tier = excluded.tier, rarity = excluded.rarity, updated_at = excluded.updated_at",
            params![herd.id, herd.owner, herd.tier, herd.rarity, now],
        )?;
        tx.execute("DELETE FROM herd_members WHERE herd_id = ?1", params![herd.id])?;
        for member in &herd.members {
            tx.execute(
                "INSERT INTO herd_members(herd_id, asset_id, name) VALUES(?1, ?2, ?3)",
                params![herd.id, member.asset_id, member.name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Herds of one tier, rarest first.
    pub fn herds_by_tier(&self, tier: i64) -> Result<Vec<Herd>> {
        self.query_herds(
            "SELECT id, owner, tier, rarity FROM herds WHERE tier = ?1 ORDER BY rarity ASC, id ASC",
            params![tier],
        )
    }

    pub fn herds_by_owner(&self, owner: &str) -> Result<Vec<Herd>> {
        self.query_herds(
            "SELECT id, owner, tier, rarity FROM herds WHERE owner = ?1 ORDER BY tier ASC, rarity ASC, id ASC",
            params![owner],
        )
    }

    fn query_herds(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Herd>> {
        let mut stmt = self.conn.prepare(sql)?;
        let herds = stmt
            .query_map(args, |row| {
                Ok(Herd {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    tier: row.get(2)?,
                    rarity: row.get(3)?,
                    members: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut members = self.conn.prepare(
            "SELECT asset_id, name FROM herd_members WHERE herd_id = ?1 ORDER BY name DESC",
        )?;
        let mut out = Vec::with_capacity(herds.len());
        for mut herd in herds {
            herd.members = members
                .query_map(params![herd.id], |row| {
                    Ok(HerdMember {
                        asset_id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(herd);
        }
        Ok(out)
    }

    // ---- votes ----------------------------------------------------------

    /// Returns false if this voter had already voted for the herd.
    pub fn cast_vote(&self, herd_id: &str, voter_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO votes(herd_id, voter_id, created_at) VALUES(?1, ?2, ?3)",
            params![herd_id, voter_id, now],
        )?;
        Ok(inserted > 0)
    }

    pub fn remove_vote(&self, herd_id: &str, voter_id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM votes WHERE herd_id = ?1 AND voter_id = ?2",
            params![herd_id, voter_id],
        )?;
        Ok(removed > 0)
    }

    pub fn vote_count(&self, herd_id: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE herd_id = ?1",
            params![herd_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn has_voted(&self, herd_id: &str, voter_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM votes WHERE herd_id = ?1 AND voter_id = ?2",
                params![herd_id, voter_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

struct CollageRow {
    id: String,
    owner_id: String,
    grid_json: String,
    settings_json: String,
    result_url: Option<String>,
    hidden: bool,
    created_at: i64,
}

impl CollageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            grid_json: row.get(2)?,
            settings_json: row.get(3)?,
            result_url: row.get(4)?,
            hidden: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<SavedCollage> {
        let grid = Grid::from_json(&self.grid_json)
            .with_context(|| format!("collage {} has an unreadable grid", self.id))?;
        let settings: CollageSettings = serde_json::from_str(&self.settings_json)
            .with_context(|| format!("collage {} has unreadable settings", self.id))?;
        Ok(SavedCollage {
            id: self.id,
            owner_id: self.owner_id,
            grid,
            settings,
            result_url: self.result_url,
            hidden: self.hidden,
            created_at: self.created_at,
        })
    }
}

const MIGRATIONS: &[(&str, &str)] = &[
    ("V0001__init", include_str!("../migrations/V0001__init.sql")),
    ("V0002__herds", include_str!("../migrations/V0002__herds.sql")),
];

fn apply_migrations(conn: &Connection) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        conn.execute_batch(sql)
            .with_context(|| format!("applying migration {name}"))?;
        conn.execute(
            "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
            params![name],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use collage::{begin_drag, AssetVariant, CollageSession};

    fn dino(id: &str, name: &str) -> OwnedAsset {
        OwnedAsset {
            asset_id: id.to_string(),
            name: name.to_string(),
            motion_url: format!("https://cdn.example/{id}.gif"),
            profile_url: format!("https://cdn.example/{id}.png"),
            motion_tag: "idle".to_string(),
        }
    }

    fn herd(id: &str, owner: &str, tier: i64, rarity: i64) -> Herd {
        Herd {
            id: id.to_string(),
            owner: owner.to_string(),
            tier,
            rarity,
            members: vec![
                HerdMember {
                    asset_id: format!("{id}-a"),
                    name: "Alpha".to_string(),
                },
                HerdMember {
                    asset_id: format!("{id}-z"),
                    name: "Zeta".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_migrations_are_recorded_once() {
        let db = GalleryDb::open_in_memory().unwrap();
        apply_migrations(db.connection()).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_saved_collage_round_trip() {
        let db = GalleryDb::open_in_memory().unwrap();
        let mut session = CollageSession::default();
        session
            .drop_on_cell(1, 2, begin_drag(&dino("7", "Rex"), AssetVariant::Motion))
            .unwrap();
        let (grid, settings) = session.snapshot();

        let id = db
            .save_collage("owner-1", &grid, &settings, Some("https://cdn.example/out.gif"))
            .unwrap();
        let saved = db.load_collage(&id).unwrap().unwrap();
        assert_eq!(saved.grid, grid);
        assert_eq!(saved.settings, settings);
        assert_eq!(saved.result_url.as_deref(), Some("https://cdn.example/out.gif"));
        assert!(!saved.hidden);
        assert!(db.load_collage("missing").unwrap().is_none());
    }

    #[test]
    fn test_hidden_collages_visible_to_owner_only() {
        let db = GalleryDb::open_in_memory().unwrap();
        let (grid, settings) = CollageSession::default().snapshot();
        let shown = db.save_collage("owner-1", &grid, &settings, None).unwrap();
        let hidden = db.save_collage("owner-1", &grid, &settings, None).unwrap();
        db.save_collage("owner-2", &grid, &settings, None).unwrap();

        assert!(db.set_collage_hidden(&hidden, true).unwrap());
        assert!(!db.set_collage_hidden("missing", true).unwrap());

        let public: Vec<String> = db
            .collages_for("owner-1", false)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(public, vec![shown.clone()]);

        let own = db.collages_for("owner-1", true).unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own[0].id, hidden);
        assert!(own[0].hidden);
    }

    #[test]
    fn test_owned_assets_grouped_by_wallet() {
        let db = GalleryDb::open_in_memory().unwrap();
        db.add_owned_asset("wallet-b", &dino("2", "Bronto")).unwrap();
        db.add_owned_asset("wallet-a", &dino("3", "Trice")).unwrap();
        db.add_owned_asset("wallet-a", &dino("1", "Ankylo")).unwrap();
        db.add_owned_asset("wallet-a", &dino("1", "Ankylo Prime")).unwrap();

        let holdings = db.owned_assets(&["wallet-a", "wallet-empty", "wallet-b"]).unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].wallet, "wallet-a");
        let names: Vec<&str> = holdings[0].assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Ankylo Prime", "Trice"]);
        assert_eq!(holdings[1].wallet, "wallet-b");
    }

    #[test]
    fn test_herd_ordering() {
        let db = GalleryDb::open_in_memory().unwrap();
        db.upsert_herd(&herd("h1", "w1", 2, 30)).unwrap();
        db.upsert_herd(&herd("h2", "w1", 1, 50)).unwrap();
        db.upsert_herd(&herd("h3", "w2", 2, 10)).unwrap();
        db.upsert_herd(&herd("h4", "w1", 1, 20)).unwrap();

        let tier2: Vec<String> = db.herds_by_tier(2).unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(tier2, vec!["h3", "h1"]);

        let owned = db.herds_by_owner("w1").unwrap();
        let ids: Vec<&str> = owned.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["h4", "h2", "h1"]);
        let member_names: Vec<&str> = owned[0].members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(member_names, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_votes_survive_herd_update() {
        let db = GalleryDb::open_in_memory().unwrap();
        db.upsert_herd(&herd("h1", "w1", 1, 10)).unwrap();

        assert!(db.cast_vote("h1", "voter-1").unwrap());
        assert!(!db.cast_vote("h1", "voter-1").unwrap());
        assert!(db.cast_vote("h1", "voter-2").unwrap());
        assert_eq!(db.vote_count("h1").unwrap(), 2);

        let mut updated = herd("h1", "w1", 1, 5);
        updated.members.pop();
        db.upsert_herd(&updated).unwrap();
        assert_eq!(db.vote_count("h1").unwrap(), 2);
        assert_eq!(db.herds_by_owner("w1").unwrap()[0].members.len(), 1);

        assert!(db.remove_vote("h1", "voter-1").unwrap());
        assert!(!db.remove_vote("h1", "voter-1").unwrap());
        assert!(!db.has_voted("h1", "voter-1").unwrap());
        assert!(db.has_voted("h1", "voter-2").unwrap());
    }

    #[test]
    fn test_vote_for_unknown_herd_is_rejected() {
        let db = GalleryDb::open_in_memory().unwrap();
        assert!(db.cast_vote("ghost", "voter-1").is_err());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gallery.db");
        let (grid, settings) = CollageSession::default().snapshot();
        let id = {
            let db = GalleryDb::open_or_create(&path).unwrap();
            assert_eq!(db.path(), Some(path.as_path()));
            db.save_collage("owner-1", &grid, &settings, None).unwrap()
        };
        let db = GalleryDb::open_or_create(&path).unwrap();
        assert!(db.load_collage(&id).unwrap().is_some());
    }
}
