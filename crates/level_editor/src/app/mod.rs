mod bootstrap;

pub(crate) use bootstrap::run;
