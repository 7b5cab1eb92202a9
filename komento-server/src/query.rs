use komento_api::{
    store::{CommentSelect, Sort, ThreadSelect},
    Uuid,
};

pub enum Bind {
    Bool(bool),
    Uuid(Uuid),
    String(String),
    I64(i64),
}

/// Assembled WHERE clause plus ORDER/OFFSET/LIMIT tail, with the values to
/// bind, assuming the comments table is aliased `c`.
#[derive(Default)]
pub struct Sql {
    pub where_clause: String,
    pub tail: String,
    pub binds: Vec<Bind>,
}

impl Sql {
    /// Adds a Bind, returning the placeholder index to refer to it.
    fn add_bind(&mut self, b: Bind) -> usize {
        self.binds.push(b);
        self.binds.len()
    }
}

pub fn to_postgres(sel: &CommentSelect, text: Option<&str>) -> Sql {
    let mut res = Sql {
        where_clause: String::from("true"),
        ..Default::default()
    };
    if let Some(id) = sel.id {
        let idx = res.add_bind(Bind::Uuid(id.0));
        res.where_clause.push_str(&format!(" AND c.id = ${idx}"));
    }
    if let Some(slug) = &sel.related_slug {
        let idx = res.add_bind(Bind::String(slug.clone()));
        res.where_clause
            .push_str(&format!(" AND c.related_slug = ${idx}"));
    }
    match sel.thread_of {
        ThreadSelect::Unfiltered => (),
        ThreadSelect::Root => res.where_clause.push_str(" AND c.thread_of IS NULL"),
        ThreadSelect::Of(parent) => {
            let idx = res.add_bind(Bind::Uuid(parent.0));
            res.where_clause
                .push_str(&format!(" AND c.thread_of = ${idx}"));
        }
    }
    if let Some(text) = text {
        let idx = res.add_bind(Bind::String(String::from(text)));
        res.where_clause.push_str(&format!(
            " AND to_tsvector('english', c.content) @@ phraseto_tsquery(${idx})"
        ));
    }
    match sel.sort {
        None => (),
        Some(Sort::CreatedAtDesc) => res.tail.push_str(" ORDER BY c.created_at DESC"),
        Some(Sort::CreatedAtAsc) => res.tail.push_str(" ORDER BY c.created_at ASC"),
    }
    if let Some(offset) = sel.offset {
        let idx = res.add_bind(Bind::I64(offset as i64));
        res.tail.push_str(&format!(" OFFSET ${idx}"));
    }
    if let Some(limit) = sel.limit {
        let idx = res.add_bind(Bind::I64(limit as i64));
        res.tail.push_str(&format!(" LIMIT ${idx}"));
    }
    res
}
