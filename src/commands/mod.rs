pub type CmdResult<T> = pgship::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod check;
pub mod normalize;
pub mod publish;
