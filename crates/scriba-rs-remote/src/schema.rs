//! Bundled SQL for bootstrapping the remote interactions schema.

/// Procedure inserting one interaction and returning its id.
pub const CREATE_PROCEDURE: &str = "create_ai_interaction";
/// Procedure listing interactions newest first.
pub const LIST_PROCEDURE: &str = "get_ai_interactions";
/// Procedure executing arbitrary SQL, used for bootstrap.
pub const EXEC_SQL_PROCEDURE: &str = "exec_sql";

/// Table and index definitions.
pub const TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS public.ai_interactions (
  id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  prompt TEXT NOT NULL,
  response TEXT NOT NULL,
  model TEXT,
  interaction_type TEXT,
  metadata JSONB DEFAULT '{}'::jsonb,
  project_id UUID,
  task_id UUID,
  document_id UUID
);

CREATE INDEX IF NOT EXISTS idx_ai_interactions_type ON public.ai_interactions(interaction_type);
CREATE INDEX IF NOT EXISTS idx_ai_interactions_project_id ON public.ai_interactions(project_id);
CREATE INDEX IF NOT EXISTS idx_ai_interactions_task_id ON public.ai_interactions(task_id);
CREATE INDEX IF NOT EXISTS idx_ai_interactions_document_id ON public.ai_interactions(document_id);
CREATE INDEX IF NOT EXISTS idx_ai_interactions_created_at ON public.ai_interactions(created_at);

GRANT ALL ON public.ai_interactions TO authenticated, anon;
"#;

/// Insert and list procedures.
pub const PROCEDURES_SQL: &str = r#"
CREATE OR REPLACE FUNCTION public.create_ai_interaction(
  p_prompt TEXT,
  p_response TEXT,
  p_model TEXT,
  p_interaction_type TEXT,
  p_metadata JSONB DEFAULT '{}'::jsonb,
  p_project_id UUID DEFAULT NULL,
  p_task_id UUID DEFAULT NULL,
  p_document_id UUID DEFAULT NULL
) RETURNS UUID AS $$
DECLARE
  v_id UUID;
BEGIN
  INSERT INTO public.ai_interactions (
    prompt, response, model, interaction_type, metadata,
    project_id, task_id, document_id
  ) VALUES (
    p_prompt, p_response, p_model, p_interaction_type, p_metadata,
    p_project_id, p_task_id, p_document_id
  )
  RETURNING id INTO v_id;
  RETURN v_id;
END;
$$ LANGUAGE plpgsql SECURITY DEFINER;

CREATE OR REPLACE FUNCTION public.get_ai_interactions(
  p_interaction_type TEXT DEFAULT NULL,
  p_project_id UUID DEFAULT NULL,
  p_task_id UUID DEFAULT NULL,
  p_document_id UUID DEFAULT NULL,
  p_limit INTEGER DEFAULT 50,
  p_offset INTEGER DEFAULT 0
) RETURNS SETOF public.ai_interactions AS $$
BEGIN
  RETURN QUERY
  SELECT *
  FROM public.ai_interactions
  WHERE
    (p_interaction_type IS NULL OR interaction_type = p_interaction_type) AND
    (p_project_id IS NULL OR project_id = p_project_id) AND
    (p_task_id IS NULL OR task_id = p_task_id) AND
    (p_document_id IS NULL OR document_id = p_document_id)
  ORDER BY created_at DESC, id DESC
  LIMIT p_limit
  OFFSET p_offset;
END;
$$ LANGUAGE plpgsql SECURITY DEFINER;
"#;

/// Full bootstrap script: table first, then procedures.
pub fn bootstrap_sql() -> String {
    format!("{TABLE_SQL}\n{PROCEDURES_SQL}")
}
