// src/db/mysql.rs
use mysql::prelude::Queryable;
use mysql::{Conn, LocalInfileHandler, OptsBuilder};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

use super::{DbError, Session};
use crate::config::DbConfig;

/// A blocking MySQL connection with autocommit off and `LOCAL INFILE`
/// restricted to the one file the pipeline registers.
pub struct MySqlSession {
    conn: Option<Conn>,
    infile: Arc<Mutex<Option<PathBuf>>>,
}

impl MySqlSession {
    pub fn connect(cfg: &DbConfig) -> Result<Self, DbError> {
        let infile: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let allowed = Arc::clone(&infile);

        let handler = LocalInfileHandler::new(move |requested, out| {
            let requested = String::from_utf8_lossy(requested).into_owned();
            let path = allowed
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "infile registry poisoned"))?
                .clone();
            match path {
                Some(path) if Path::new(&requested) == path.as_path() => {
                    let mut file = File::open(&path)?;
                    let bytes = io::copy(&mut file, out)?;
                    debug!(file = %path.display(), bytes, "served local infile");
                    Ok(())
                }
                _ => {
                    warn!(requested = %requested, "refused local infile request");
                    Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("local infile {requested} was not registered"),
                    ))
                }
            }
        });

        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(cfg.host.as_str()))
            .user(Some(cfg.user.as_str()))
            .pass(Some(cfg.password.as_str()))
            .db_name(Some(cfg.database.as_str()))
            .init(vec!["SET autocommit = 0"])
            .local_infile_handler(Some(handler));

        let conn = Conn::new(opts)?;
        debug!(host = %cfg.host, database = %cfg.database, "connected");
        Ok(Self {
            conn: Some(conn),
            infile,
        })
    }

    fn conn(&mut self) -> Result<&mut Conn, DbError> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::Session("connection already closed".into()))
    }

    fn register_infile(&self, path: Option<PathBuf>) -> Result<(), DbError> {
        let mut slot = self
            .infile
            .lock()
            .map_err(|_| DbError::Session("infile registry poisoned".into()))?;
        *slot = path;
        Ok(())
    }
}

impl Session for MySqlSession {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.conn()?.query_drop(sql)?;
        Ok(())
    }

    fn load_local_file(&mut self, sql: &str, path: &Path) -> Result<(), DbError> {
        self.register_infile(Some(path.to_path_buf()))?;
        let result = self.conn().and_then(|c| c.query_drop(sql).map_err(DbError::from));
        self.register_infile(None)?;
        result
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn()?.query_drop("COMMIT")?;
        Ok(())
    }

    fn discard_uncommitted(&mut self) -> Result<(), DbError> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn.query_drop("ROLLBACK")?),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), DbError> {
        // dropping the Conn sends COM_QUIT
        drop(self.conn.take());
        Ok(())
    }
}
