use std::ops::{Deref, DerefMut};

/// State shared by the writer methods while printing one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Placeholders written so far.
    pub counter: u32,
    /// Columns are written as `"table"."column"` when set.
    pub qualify_columns: bool,
}

impl Context {
    pub fn new(qualify_columns: bool) -> Self {
        Self {
            counter: 0,
            qualify_columns,
        }
    }

    /// Columns written through the returned guard are bare, qualification comes back on drop.
    pub fn unqualified(&mut self) -> Unqualified<'_> {
        let qualify_columns = self.qualify_columns;
        self.qualify_columns = false;
        Unqualified {
            context: self,
            qualify_columns,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(true)
    }
}

pub struct Unqualified<'a> {
    context: &'a mut Context,
    qualify_columns: bool,
}

impl Deref for Unqualified<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.context
    }
}

impl DerefMut for Unqualified<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.context
    }
}

impl Drop for Unqualified<'_> {
    fn drop(&mut self) {
        self.context.qualify_columns = self.qualify_columns;
    }
}
